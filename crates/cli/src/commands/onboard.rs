//! `jurisflow onboard`: first-time setup.

use jurisflow_config::AppConfig;
use jurisflow_core::role::PipelineRole;

/// Starter system prompts, one per role. Edit the written files to tune them.
fn starter_prompt(role: PipelineRole) -> &'static str {
    match role {
        PipelineRole::Redator => concat!(
            "Você é o redator técnico de um escritório de advocacia previdenciária.\n\n",
            "- Organize os fatos do caso em um relatório técnico objetivo\n",
            "- Destaque datas, documentos, CIDs e vínculos empregatícios mencionados\n",
            "- Quando solicitado, consolide as análises anteriores em um relatório final\n",
        ),
        PipelineRole::Medico => concat!(
            "Você é um médico perito que apoia a equipe jurídica.\n\n",
            "- Avalie as informações médicas do relatório técnico\n",
            "- Relacione diagnósticos (CID) com a capacidade laborativa\n",
            "- Aponte exames ou laudos que faltam\n",
        ),
        PipelineRole::Estrategista => concat!(
            "Você é o estrategista jurídico do escritório.\n\n",
            "- Defina a tese principal e as subsidiárias\n",
            "- Indique a legislação e a jurisprudência aplicáveis\n",
            "- Avalie riscos e próximos passos processuais\n",
        ),
        PipelineRole::Supervisor => concat!(
            "Você é o supervisor jurídico responsável pela resposta final ao advogado.\n\n",
            "- Revise toda a conversa e produza uma resposta consolidada\n",
            "- Se faltar informação essencial, inclua o marcador [PEDIDO_INFO] e diga o que falta\n",
        ),
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let prompts_dir = AppConfig::prompts_dir();

    println!("JurisFlow: First-Time Setup");
    println!("===========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !prompts_dir.exists() {
        std::fs::create_dir_all(&prompts_dir)?;
        println!("Created prompts directory: {}", prompts_dir.display());
    }

    for role in PipelineRole::ALL {
        let path = prompts_dir.join(format!("{role}.md"));
        if path.exists() {
            println!("  Keeping existing {}", path.display());
            continue;
        }
        std::fs::write(&path, starter_prompt(role))?;
        println!("Created {}", path.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set JURISFLOW_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Run: jurisflow doctor");
        println!("   3. Run: jurisflow run --message \"...\"\n");
    }

    println!("Setup complete.\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisor_prompt_mentions_sentinel() {
        assert!(starter_prompt(PipelineRole::Supervisor).contains(jurisflow_pipeline::SENTINEL));
        for role in PipelineRole::ALL {
            assert!(!starter_prompt(role).trim().is_empty());
        }
    }
}
