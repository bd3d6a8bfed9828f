//! Detection of "I need more information" in supervisor replies.
//!
//! The supervisor signals it cannot conclude by emitting [`SENTINEL`] or one
//! of a few equivalent Portuguese phrases. Matching is case-insensitive
//! substring search. Everything that inspects replies for this goes through
//! [`needs_more_input`].

/// The marker the supervisor is instructed to emit.
pub const SENTINEL: &str = "[PEDIDO_INFO]";

/// Lowercased markers; any one of them flags the reply.
const MARKERS: [&str; 4] = [
    "[pedido_info]",
    "preciso que o usuário",
    "aguardo informação",
    "informe",
];

/// Whether a supervisor reply asks the user for more input.
pub fn needs_more_input(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_token() {
        assert!(needs_more_input("Parecer parcial. [PEDIDO_INFO] Falta a data."));
        assert!(needs_more_input("[pedido_info]"));
    }

    #[test]
    fn equivalent_phrases_any_case() {
        assert!(needs_more_input(
            "Aguardo informação adicional sobre a data do acidente."
        ));
        assert!(needs_more_input("PRECISO QUE O USUÁRIO envie o CAT."));
        assert!(needs_more_input("Por favor, Informe o número do benefício."));
    }

    #[test]
    fn plain_conclusion_is_not_flagged() {
        assert!(!needs_more_input(
            "O segurado faz jus ao auxílio-acidente. Recomenda-se ajuizar a ação."
        ));
        assert!(!needs_more_input(""));
    }

    #[test]
    fn sentinel_constant_matches_itself() {
        assert!(needs_more_input(SENTINEL));
    }
}
