//! `jurisflow run`: the full five-stage analysis of one case.

use jurisflow_pipeline::{PipelineState, RunRequest};

use crate::bootstrap;

pub struct RunArgs {
    pub message: String,
    pub session: Option<String>,
    pub client: Option<String>,
    pub attendance: Option<String>,
    pub user: Option<String>,
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config()?;
    let pipeline = bootstrap::build_pipeline(&config).await?;
    let identity = bootstrap::local_identity(args.user);

    let request = RunRequest {
        message: args.message,
        session_id: args.session,
        client_id: args.client,
        attendance_id: args.attendance,
    };

    let outcome = match pipeline.run(request, identity.as_ref()).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            eprintln!("\nPipeline failed at stage '{}'", failure.failed_stage);
            if !failure.completed_stages.is_empty() {
                let done: Vec<&str> = failure.completed_stages.iter().map(|s| s.as_str()).collect();
                eprintln!("   Completed and saved: {}", done.join(", "));
            }
            if let Some(session_id) = &failure.session_id {
                eprintln!("   Session: {session_id}");
            }
            if failure.error.is_retryable() {
                eprintln!("   This looks temporary. Try again in a moment.");
            }
            return Err(failure.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    for stage in &outcome.stages {
        println!("\n== {} ({}) ==\n", stage.state, stage.role);
        println!("{}", stage.response);
    }

    println!();
    if let Some(warning) = &outcome.warning {
        println!("Warning: {warning}");
        println!("Run stopped at stage '{}'.", outcome.state);
    } else if outcome.state == PipelineState::Done && outcome.needs_more_input {
        println!("The supervisor needs more information. Answer with:");
        println!(
            "   jurisflow follow-up {} --message \"...\"",
            outcome.session_id
        );
    }
    println!("Session: {}", outcome.session_id);

    Ok(())
}
