//! Building the user message for each stage.
//!
//! Every composed prompt carries the full text of the outputs it builds on.
//! Nothing is summarized or truncated between stages.

use jurisflow_core::event::InteractionEvent;
use jurisflow_core::role::PipelineRole;

use crate::sentinel::SENTINEL;

/// Input for the medical review: the technical report.
pub fn medical_prompt(technical_report: &str) -> String {
    format!(
        "Com base no relatório técnico abaixo, elabore uma análise médica do caso, \
         apontando patologias, nexo causal e limitações funcionais.\n\n\
         ## Relatório técnico\n{technical_report}"
    )
}

/// Input for the strategist: technical report and medical review.
pub fn strategic_prompt(technical_report: &str, medical_review: &str) -> String {
    format!(
        "Com base no relatório técnico e na análise médica abaixo, defina a estratégia \
         jurídica do caso: fundamentos, provas necessárias e riscos.\n\n\
         ## Relatório técnico\n{technical_report}\n\n\
         ## Análise médica\n{medical_review}"
    )
}

/// Input for the second drafter pass: all three prior outputs.
pub fn final_report_prompt(
    technical_report: &str,
    medical_review: &str,
    strategy: &str,
) -> String {
    format!(
        "Consolide as análises abaixo em um relatório final único, coerente e completo, \
         pronto para revisão.\n\n\
         ## Relatório técnico\n{technical_report}\n\n\
         ## Análise médica\n{medical_review}\n\n\
         ## Estratégia jurídica\n{strategy}"
    )
}

/// Input for the supervisor at the end of a run: the whole conversation.
pub fn supervisor_prompt(history: &[InteractionEvent]) -> String {
    format!(
        "Revise toda a conversa abaixo e produza a resposta final consolidada para o \
         usuário. Se faltar alguma informação indispensável para concluir, escreva \
         {SENTINEL} e diga exatamente o que precisa ser informado.\n\n\
         ## Conversa\n{}",
        transcript(history)
    )
}

/// Input for a role invoked directly against an existing session.
pub fn manual_role_prompt(
    role: PipelineRole,
    history: &[InteractionEvent],
    instruction: Option<&str>,
) -> String {
    let instruction = instruction
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_instruction(role));

    let mut prompt = format!("{instruction}\n\n## Conversa\n{}", transcript(history));
    if role == PipelineRole::Supervisor {
        prompt.push_str(&format!(
            "\n\nSe faltar alguma informação indispensável, escreva {SENTINEL}."
        ));
    }
    prompt
}

/// Input for the supervisor when the user answers its request for information.
pub fn follow_up_prompt(history: &[InteractionEvent], answer: &str) -> String {
    format!(
        "O usuário respondeu ao seu pedido de informações. Reavalie o caso com a conversa \
         completa e a resposta abaixo e produza a resposta final consolidada. Se ainda \
         faltar algo indispensável, escreva {SENTINEL}.\n\n\
         ## Conversa\n{}\n\n\
         ## Resposta do usuário\n{answer}",
        transcript(history)
    )
}

fn default_instruction(role: PipelineRole) -> String {
    match role {
        PipelineRole::Redator => "Com base na conversa abaixo, redija um relatório atualizado do caso.",
        PipelineRole::Medico => "Com base na conversa abaixo, elabore ou atualize a análise médica do caso.",
        PipelineRole::Estrategista => "Com base na conversa abaixo, revise a estratégia jurídica do caso.",
        PipelineRole::Supervisor => "Revise toda a conversa abaixo e produza a resposta final consolidada para o usuário.",
    }
    .to_string()
}

/// Render a history as labelled blocks, oldest first.
pub fn transcript(history: &[InteractionEvent]) -> String {
    history
        .iter()
        .map(|event| {
            let label = match event {
                InteractionEvent::UserMessageToBot { role_called, .. } => {
                    format!("[mensagem para {role_called}]")
                }
                InteractionEvent::BotResponse { role, .. } => format!("[resposta de {role}]"),
            };
            format!("{label}\n{}", event.content())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
