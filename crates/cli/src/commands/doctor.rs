//! `jurisflow doctor`: diagnose configuration and model connectivity.

use jurisflow_config::AppConfig;
use jurisflow_core::model::ModelClient as _;
use jurisflow_core::role::PipelineRole;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("JurisFlow Doctor");
    println!("================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file, using defaults (run `jurisflow onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    // Prompt files
    let prompts_dir = config.pipeline.prompts_path();
    for role in PipelineRole::ALL {
        let found = ["md", "txt"].iter().any(|ext| {
            std::fs::read_to_string(prompts_dir.join(format!("{role}.{ext}")))
                .is_ok_and(|s| !s.trim().is_empty())
        });
        if found {
            println!("  [ok]   Prompt for {role}");
        } else {
            println!("  [warn] No prompt for {role}, the default prompt will be used");
            issues += 1;
        }
    }

    // Storage
    match config.storage.backend.as_str() {
        "memory" => println!("  [warn] In-memory storage: history is lost on restart"),
        _ => println!(
            "  [ok]   SQLite storage at {}",
            config.storage.database_path().display()
        ),
    }

    // Model endpoint
    if !config.has_api_key() {
        println!("  [fail] No API key configured (set JURISFLOW_API_KEY)");
        issues += 1;
    } else {
        match jurisflow_providers::build_from_config(&config) {
            Ok(client) => match client.health_check().await {
                Ok(true) => println!("  [ok]   Model endpoint reachable ({})", config.api_url),
                Ok(false) => {
                    println!("  [fail] Model endpoint rejected the health check ({})", config.api_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  [fail] Model endpoint unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  [fail] Could not build model client: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
