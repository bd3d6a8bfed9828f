//! `jurisflow invoke` and `jurisflow follow-up`: one model call at a time.

use jurisflow_core::role::PipelineRole;
use jurisflow_pipeline::{StageReply, StageRequest};

use crate::bootstrap;

pub struct InvokeArgs {
    pub role: String,
    pub message: Option<String>,
    pub session: Option<String>,
    pub client: Option<String>,
    pub attendance: Option<String>,
    pub user: Option<String>,
}

pub async fn run(args: InvokeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let role: PipelineRole = args.role.parse()?;

    let config = bootstrap::load_config()?;
    let pipeline = bootstrap::build_pipeline(&config).await?;
    let identity = bootstrap::local_identity(args.user);

    let reply = match (args.message, args.session) {
        // No message: let the role work on the session's history.
        (None, Some(session_id)) => {
            pipeline
                .invoke_role_on_history(&session_id, role, None, identity.as_ref())
                .await?
        }
        (None, None) => return Err("--message is required without --session".into()),
        (Some(message), session) => {
            let request = StageRequest {
                role,
                message,
                session_id: session,
                client_id: args.client,
                attendance_id: args.attendance,
            };
            pipeline.invoke_stage(request, identity.as_ref()).await?
        }
    };

    print_reply(&reply);
    Ok(())
}

pub async fn follow_up(
    session_id: String,
    message: String,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config()?;
    let pipeline = bootstrap::build_pipeline(&config).await?;
    let identity = bootstrap::local_identity(user);

    let reply = pipeline
        .follow_up(&session_id, &message, identity.as_ref())
        .await?;

    print_reply(&reply);
    Ok(())
}

fn print_reply(reply: &StageReply) {
    match &reply.warning {
        Some(warning) => println!("Warning: {warning}"),
        None => println!("{}", reply.response),
    }
    println!();
    if reply.new_session {
        println!("New session: {}", reply.session_id);
    } else {
        println!("Session: {}", reply.session_id);
    }
    if reply.needs_more_input {
        println!("The supervisor needs more information (use `jurisflow follow-up`).");
    }
}
