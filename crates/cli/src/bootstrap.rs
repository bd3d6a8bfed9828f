//! Wiring shared by every command that talks to the pipeline.

use std::sync::Arc;

use jurisflow_config::AppConfig;
use jurisflow_core::identity::Identity;
use jurisflow_pipeline::{ConversationHistory, Pipeline, PromptResolver};
use jurisflow_store::{InMemoryStore, SqliteStore};
use tracing::info;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The configured storage backend.
pub enum Storage {
    Memory(Arc<InMemoryStore>),
    Sqlite(Arc<SqliteStore>),
}

impl Storage {
    /// Open the backend named in config. Needs no model credentials.
    pub async fn open(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        match config.storage.backend.as_str() {
            "memory" => {
                info!("Using in-memory store; sessions will not survive a restart");
                Ok(Storage::Memory(Arc::new(InMemoryStore::new())))
            }
            _ => {
                let path = config.storage.database_path();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let store = SqliteStore::new(&format!("sqlite://{}", path.display())).await?;
                Ok(Storage::Sqlite(Arc::new(store)))
            }
        }
    }

    /// Read-only access to session histories.
    pub fn history(&self) -> ConversationHistory {
        match self {
            Storage::Memory(store) => ConversationHistory::new(store.clone()),
            Storage::Sqlite(store) => ConversationHistory::new(store.clone()),
        }
    }
}

/// Build the pipeline from config: model client, store, prompt files.
pub async fn build_pipeline(config: &AppConfig) -> Result<Arc<Pipeline>, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    JURISFLOW_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let client = jurisflow_providers::build_from_config(config)?;
    let prompts = PromptResolver::from_config(config);

    let pipeline = match Storage::open(config).await? {
        Storage::Memory(store) => Pipeline::with_store(client, prompts, store),
        Storage::Sqlite(store) => Pipeline::with_store(client, prompts, store),
    };

    Ok(Arc::new(pipeline))
}

/// A local operator acting as `user_id`.
pub fn local_identity(user_id: Option<String>) -> Option<Identity> {
    user_id
        .filter(|u| !u.trim().is_empty())
        .map(|u| Identity::new(u.clone(), u, "operador"))
}
