use std::io::{self, BufReader};
use std::sync::Arc;

use ausweis_sdk_wrapper::bridge;
use ausweis_sdk_wrapper::config::BridgeConfig;
use ausweis_sdk_wrapper::{WorkflowController, channel_transport, stdio};
use log::{error, info};
use tokio::runtime::Handle;

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting SDK bridge...");

    let config = match std::env::args().nth(1) {
        Some(path) => match BridgeConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => BridgeConfig::default(),
    };

    // The eID service speaks JSON lines on our stdin/stdout, so logs go to stderr
    let (transport, remote) = channel_transport();
    stdio::serve(remote, BufReader::new(io::stdin()), io::stdout());

    let controller = WorkflowController::new(Arc::new(transport), &Handle::current());
    controller.start();

    // Start WebSocket Server
    bridge::start_server(controller, config).await;
}
