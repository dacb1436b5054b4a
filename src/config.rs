use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Runtime configuration of one simulator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Listener address. Port `0` picks an ephemeral port.
    pub bind: SocketAddr,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)),
        }
    }
}

/// Command line of the `shelly-simulator` binary.
#[derive(Debug, Parser)]
#[command(name = "shelly-simulator", version, about = "Simulated Shelly device fleet")]
pub struct Cli {
    /// JSON fixture describing the devices to simulate
    #[arg(long, env = "SHELLY_SIM_FIXTURE")]
    pub fixture: PathBuf,

    /// Address to listen on
    #[arg(long, env = "SHELLY_SIM_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

impl Cli {
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig { bind: self.bind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_ephemeral_localhost() {
        let config = SimulatorConfig::default();
        assert!(config.bind.ip().is_loopback());
        assert_eq!(config.bind.port(), 0);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["shelly-simulator", "--fixture", "fleet.json", "--bind", "0.0.0.0:9000"]);
        assert_eq!(cli.fixture, PathBuf::from("fleet.json"));
        assert_eq!(cli.simulator_config().bind.port(), 9000);
    }
}
