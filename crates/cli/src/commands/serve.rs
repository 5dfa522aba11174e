//! `dispatch serve`: run the HTTP API.

use dispatch_config::AppConfig;

pub async fn run(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if !config.has_api_key() {
        eprintln!("  Warning: no API key configured; chat and standup requests will fail.");
    }

    println!("Dispatch Gateway");
    println!("   Vault:     {}", config.vault_path.display());
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);

    dispatch_gateway::start(config).await
}
