//! `jurisflow history`: print what a session has recorded.

use jurisflow_core::event::InteractionEvent;
use jurisflow_core::identity::effective_user_id;

use crate::bootstrap;

pub async fn run(
    session_id: String,
    user: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config()?;
    let storage = bootstrap::Storage::open(&config).await?;
    let identity = bootstrap::local_identity(user);

    let history = storage
        .history()
        .read_owned(&session_id, &effective_user_id(identity.as_ref()))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No history for session {session_id}.");
        return Ok(());
    }

    for event in &history {
        match event {
            InteractionEvent::UserMessageToBot {
                role_called,
                content,
                timestamp,
            } => println!("[{}] -> {role_called}\n{content}\n", timestamp.format("%Y-%m-%d %H:%M:%S")),
            InteractionEvent::BotResponse {
                role,
                content,
                timestamp,
            } => println!("[{}] <- {role}\n{content}\n", timestamp.format("%Y-%m-%d %H:%M:%S")),
        }
    }
    println!("{} events", history.len());

    Ok(())
}
