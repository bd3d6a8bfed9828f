//! `jurisflow serve`: start the HTTP API.

use crate::bootstrap;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = bootstrap::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let pipeline = bootstrap::build_pipeline(&config).await?;

    println!("JurisFlow API");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.model, pipeline.client_name());
    println!("   Storage:   {}", config.storage.backend);

    jurisflow_gateway::start(&config, pipeline).await?;

    Ok(())
}
