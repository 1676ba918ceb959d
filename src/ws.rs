// src/ws.rs
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use warp::Filter;

use mifare_ndef::types::{IncomingMessage, NfcCommand, OutgoingMessage};

pub async fn start_server(
    addr: SocketAddr,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
) {
    // Fan-out to every connected client
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // Reader thread events
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        while let Ok(msg) = nfc_event_rx.recv().await {
            let _ = ws_tx_clone.send(msg);
        }
    });

    // Clients connect on the root path
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();
            ws.on_upgrade(move |socket| handle_connection(socket, nfc_cmd_tx, ws_tx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", addr);
    warp::serve(routes).run(addr).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    // Broadcasts -> Client
    tokio::spawn(async move {
        while let Ok(msg) = rx_broadcast.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Dropping unserializable event: {}", e);
                    continue;
                }
            };
            if client_ws_tx.send(warp::ws::Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    // Client -> NFC thread
    while let Some(Ok(msg)) = client_ws_rx.next().await {
        let Ok(text) = msg.to_str() else {
            continue;
        };
        match serde_json::from_str::<IncomingMessage>(text) {
            Ok(IncomingMessage::GetReaderStatus) => {
                let _ = nfc_cmd_tx.send(NfcCommand::CheckReaderStatus);
            }
            Ok(IncomingMessage::WriteData { payloads }) => {
                info!("Incoming write with {} records", payloads.len());
                let _ = nfc_cmd_tx.send(NfcCommand::Write { payloads });
            }
            Err(e) => warn!("Ignoring malformed client message: {}", e),
        }
    }
}
