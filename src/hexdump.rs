// src/hexdump.rs
use crate::medium::BlockAddress;

pub fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn text_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|&b| match b {
            0x00 => "----".to_string(),
            0x20..=0x7E => format!("{:>4}", b as char),
            _ => format!("{:>4}", format!("{:02x}", b)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_block(addr: BlockAddress, data: &[u8], sign: &str) -> String {
    format!("[{}] {}: {} {}", sign, addr, hex_bytes(data), text_bytes(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_block_line() {
        let addr = BlockAddress::new(4).unwrap();
        let line = format_block(addr, &[0x03, 0x41, 0x00], "<<");
        assert_eq!(line, "[<<] 0x04: 03:41:00   03    A ----");
    }
}
