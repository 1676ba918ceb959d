mod nfc_service;
mod ws;

use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::broadcast;

use mifare_ndef::config::ServiceConfig;
use mifare_ndef::types::{NfcCommand, OutgoingMessage};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(2);
        }
    };
    info!("Starting NFC Rust Service on {}...", config.bind_addr);

    // WS -> NFC commands over crossbeam, the NFC thread blocks on PC/SC
    let (cmd_tx, cmd_rx) = unbounded::<NfcCommand>();

    // NFC -> WS events, fanned out to every client
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    let bind_addr = config.bind_addr;
    std::thread::spawn(move || {
        // Bridge sync sends from the NFC thread into the broadcast channel
        let (bridge_tx, bridge_rx) = unbounded::<OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(bridge_tx, cmd_rx, config);
        });

        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(bind_addr, cmd_tx, event_rx).await;
}
