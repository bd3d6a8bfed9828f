//! Model client implementations for JurisFlow.
//!
//! All clients implement `jurisflow_core::ModelClient`. `build_from_config`
//! assembles the production stack (HTTP client + retry policy).

pub mod factory;
pub mod openai_compat;
pub mod retry;

pub use factory::{build_from_config, retry_policy};
pub use openai_compat::OpenAiCompatClient;
pub use retry::{RetryPolicy, RetryingClient};
