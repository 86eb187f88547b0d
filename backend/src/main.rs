use account_service::{api, config::Config, telemetry};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    telemetry::init(config.is_production());
    info!(env = ?config.app_env, "starting account service");

    api::server::start_server(config).await?;
    Ok(())
}
