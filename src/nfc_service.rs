// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use pcsc::{Card, Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use mifare_ndef::apdu::{ATR_MIFARE_1K, PcscDriver};
use mifare_ndef::config::ServiceConfig;
use mifare_ndef::medium::NDEF_BLOCKS;
use mifare_ndef::types::{NdefPayload, NfcCommand, OutgoingMessage, message_views};
use mifare_ndef::{Message, NfcError, Record, Result, TagInfo, TagSession, tag};

pub fn run(tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>, config: ServiceConfig) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::ReaderError {
                error: err.to_string(),
            });
            return;
        }
    };

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(config.poll_interval, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. Commands from the WebSocket side
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::Write { payloads } => {
                    info!("Received Write Command with {} records", payloads.len());
                    handle_write_command(&ctx, &reader_names, &payloads, &config, &tx);
                }
                NfcCommand::CheckReaderStatus => {
                    refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &mut reader_states, &tx);
                }
            }
        }

        // 3. Card and reader events
        let mut readers_changed = false;

        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        for i in 1..reader_states.len() {
            let rs = &reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }
            let name = reader_names[i - 1].clone();
            let current = rs.event_state();

            if current.intersects(State::PRESENT) && !rs.current_state().intersects(State::PRESENT) {
                info!("Card Inserted on {:?}", name);
                handle_card_insertion(&ctx, &name, &config, &tx);
            }

            if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT) {
                info!("Card Removed from {:?}", name);
                let _ = tx.send(OutgoingMessage::CardStatus {
                    success: false,
                    message: "Card removed!".into(),
                });
            }

            reader_states[i].sync_current_state();
        }

        // 4. Refresh the reader list
        if readers_changed {
            refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &mut reader_states, &tx);
        }
    }
}

fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    reader_states: &mut Vec<ReaderState>,
    tx: &Sender<OutgoingMessage>,
) {
    // keep the PnP state at index 0 and rebuild the rest
    reader_states.truncate(1);
    match ctx.list_readers(readers_buf) {
        Ok(iter) => {
            *reader_names = iter.map(CString::from).collect();
            for name in reader_names.iter() {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }
        }
        Err(err) => {
            warn!("Listing readers failed: {}", err);
            reader_names.clear();
        }
    }
    let _ = tx.send(OutgoingMessage::ReaderStatus {
        success: !reader_names.is_empty(),
    });
}

fn open_session(card: Card) -> Result<TagSession<PcscDriver>> {
    let session = TagSession::open(PcscDriver::new(card))?;
    if session.tag().tag_type != ATR_MIFARE_1K {
        return Err(NfcError::Reader(format!(
            "Unsupported card type 0x{:02x}",
            session.tag().tag_type
        )));
    }
    Ok(session)
}

fn read_card(card: Card, config: &ServiceConfig) -> Result<(TagInfo, Vec<Message>)> {
    let mut session = open_session(card)?;
    let key = tag::discover_key(&mut session, NDEF_BLOCKS[0], &config.keys)?;
    let messages = tag::read_tag_messages(&mut session, key)?;
    Ok((session.tag().clone(), messages))
}

fn write_card(card: Card, payloads: &[NdefPayload], config: &ServiceConfig) -> Result<()> {
    let mut session = open_session(card)?;
    let key = tag::discover_key(&mut session, NDEF_BLOCKS[0], &config.keys)?;
    let message = Message::new(payloads.iter().map(Record::from).collect());
    tag::write_tag_messages(&mut session, &[message], key)
}

fn handle_card_insertion(ctx: &Context, reader_name: &CStr, config: &ServiceConfig, tx: &Sender<OutgoingMessage>) {
    let _ = tx.send(OutgoingMessage::CardStatus {
        success: true,
        message: "Card detected!".into(),
    });

    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            return;
        }
    };

    match read_card(card, config) {
        Ok((tag, messages)) => {
            info!("Read {} messages from {}", messages.len(), tag);
            let _ = tx.send(OutgoingMessage::DataReadSuccess {
                uid: hex::encode(&tag.uid),
                messages: message_views(&messages),
            });
        }
        Err(e) => {
            warn!("Reading card failed: {}", e);
            let _ = tx.send(OutgoingMessage::DataReadError { error: e.to_string() });
        }
    }
}

fn handle_write_command(
    ctx: &Context,
    reader_names: &[CString],
    payloads: &[NdefPayload],
    config: &ServiceConfig,
    tx: &Sender<OutgoingMessage>,
) {
    if reader_names.is_empty() {
        let _ = tx.send(OutgoingMessage::DataWriteError {
            error: "No reader connected".into(),
        });
        return;
    }

    // First reader with a card on it takes the write
    let card = reader_names
        .iter()
        .find_map(|name| ctx.connect(name, ShareMode::Shared, Protocols::ANY).ok());
    let Some(card) = card else {
        let _ = tx.send(OutgoingMessage::DataWriteError {
            error: "No card found on reader".into(),
        });
        return;
    };

    let event = match write_card(card, payloads, config) {
        Ok(()) => OutgoingMessage::DataWriteSuccess {
            message: "Data Written Successfully!".into(),
        },
        Err(e) => {
            warn!("Writing card failed: {}", e);
            OutgoingMessage::DataWriteError { error: e.to_string() }
        }
    };
    let _ = tx.send(event);
}
