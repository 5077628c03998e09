#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::time::Duration;

use adapter::Destination;
use anyhow::{bail, Context, Result};
use coordinator::{zdo, Config, Coordinator, Event, MemoryStore, COORDINATOR_ADDRESS};
use futures::StreamExt;

const USAGE: &str = "usage: zigbeed [config.toml] [serial port]";

fn config() -> Result<Config> {
    let mut config_path = None;
    let mut serial_path = None;

    for arg in std::env::args().skip(1) {
        if arg.ends_with(".toml") && config_path.is_none() {
            config_path = Some(PathBuf::from(arg));
        } else if serial_path.is_none() {
            serial_path = Some(PathBuf::from(arg));
        } else {
            bail!(USAGE);
        }
    }

    let mut config = match config_path {
        Some(path) => {
            Config::load(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(path) = serial_path {
        config.serial.path = path;
    }
    Ok(config)
}

/// Logs the coordinator's neighbours and lets new devices in for a minute.
async fn network_started(coordinator: Coordinator) -> Result<()> {
    let (version, platform) = coordinator.version().await?;
    info!("adapter firmware {:?} on {:?}", version, platform);

    let neighbors = coordinator
        .get_neighbors(Destination::Nwk(COORDINATOR_ADDRESS, zdo::ENDPOINT))
        .await?;
    for neighbor in neighbors {
        info!(
            "neighbor {:#018x} at {:#06x} ({:?}, lqi {})",
            neighbor.extended_address,
            neighbor.network_address,
            neighbor.device_type,
            neighbor.link_quality_index
        );
    }

    coordinator
        .set_permit_joining(Duration::from_secs(60), None)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = config()?;
    info!("using adapter at {}", config.serial.path.display());

    let (coordinator, mut events) = Coordinator::open(config, Box::new(MemoryStore::new()));

    while let Some(event) = events.next().await {
        match event {
            Event::NetworkStarted(configuration) => {
                info!("network started: {:?}", configuration);
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    if let Err(error) = network_started(coordinator).await {
                        error!("{:#}", error);
                    }
                });
            }
            Event::NetworkFailed(reason) => error!("network failed: {}", reason),
            Event::NodeJoined(node) => info!(
                "node {:#018x} joined with endpoints {:?}",
                node.ieee_address,
                node.endpoints.keys().collect::<Vec<_>>()
            ),
            Event::NodeLeft { ieee_address, .. } => info!("node {:#018x} left", ieee_address),
            Event::NodeDiscoveryFailed {
                ieee_address,
                error,
                ..
            } => warn!("could not discover {:#018x}: {}", ieee_address, error),
            Event::Indication {
                ieee_address,
                indication,
            } => info!(
                "{:#018x}: cluster {:#06x} {:02x?}",
                ieee_address, indication.cluster_id, indication.asdu
            ),
            other => debug!("{:?}", other),
        }
    }

    Ok(())
}
