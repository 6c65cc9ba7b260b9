// Bootstrap binary for the bus emulator. The wire-protocol front ends that
// would sit in front of this (HTTP/JSON for the queue service, form-encoded
// XML for the topic service) are out of core scope; this binary exists to
// construct the bus and keep it alive for an embedding process to drive.

use bus_emulator::{BusConfig, MessageBus, SystemTimeProvider, VERSION};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    info!("starting bus-emulator v{VERSION}");

    let config = BusConfig::default();
    let _bus = MessageBus::new(config.clone(), Arc::new(SystemTimeProvider));

    info!(
        partition = %config.partition,
        region = %config.region,
        account_id = %config.account_id,
        "bus ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl-c handler: {e}");
    }
    info!("shutting down");
}
