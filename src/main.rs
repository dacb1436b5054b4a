use clap::Parser;
use log::{error, info};
use shelly_simulator::{Cli, Fixture, Simulator};
use tokio::signal;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

async fn run(cli: Cli) -> shelly_simulator::Result<()> {
    let fixture = Fixture::from_path(&cli.fixture)?;
    let handle = Simulator::new(fixture)?
        .start(cli.simulator_config())
        .await?;

    info!("Shelly simulator is running at {}", handle.base_url());
    for device in handle.registry().devices() {
        info!(
            "  - {} (gen {}, {}): {}",
            device.name,
            device.protocol_generation.number(),
            device.model,
            handle.device_url(&device.name)
        );
    }
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    handle.shutdown().await?;
    info!("Shelly simulator stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logger();
    let cli = Cli::parse();
    info!("Starting Shelly simulator");

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
