// src/config.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{NfcError, Result};
use crate::key::{COMMON_KEYS, Key, KeyMode};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3500";
pub const DEFAULT_POLL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub keys: Vec<Key>,
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3500)),
            keys: COMMON_KEYS.to_vec(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig::default();
        if let Some(addr) = lookup("NFC_SERVICE_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| NfcError::Config(format!("NFC_SERVICE_ADDR: {}", addr)))?;
        }
        if let Some(keys) = lookup("NFC_KEYS") {
            config.keys = parse_keys(&keys)?;
        }
        if let Some(ms) = lookup("NFC_POLL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| NfcError::Config(format!("NFC_POLL_MS: {}", ms)))?;
            config.poll_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

// d3f7d3f7d3f7,ffffffffffff:B (mode defaults to A)
pub fn parse_keys(list: &str) -> Result<Vec<Key>> {
    let keys = list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (hex_key, mode) = match item.split_once(':') {
                Some((hex_key, "A" | "a")) => (hex_key, KeyMode::A),
                Some((hex_key, "B" | "b")) => (hex_key, KeyMode::B),
                Some(_) => return Err(NfcError::InvalidKey),
                None => (item, KeyMode::A),
            };
            Key::from_hex(hex_key, mode)
        })
        .collect::<Result<Vec<_>>>()?;
    if keys.is_empty() {
        return Err(NfcError::Config("NFC_KEYS holds no keys".into()));
    }
    Ok(keys)
}
