//! Binary event log decoding.
//!
//! The pipeline: the log file is split into fixed 512-byte pages, each
//! page is scanned for a sync frame followed by message frames (all CRC8
//! checked), and every valid message is rendered through its format
//! template into one output line. Rendered lines go to the caller's sink;
//! all diagnostics go to the `tracing` channel.

pub mod crc;
pub mod page;
pub mod template;
pub mod types;

pub use page::{resync, scan_page, PAGE_SIZE};
pub use types::{Argument, FrameHeader, LogLine};

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::table::FormatTable;

/// Decode a binary log file, writing rendered lines to `out`.
///
/// Failure to open or map the file is fatal. Everything inside the file
/// is handled by per-page recovery and never returns an error.
pub fn decode_file(path: &Path, table: &FormatTable, out: &mut impl Write) -> io::Result<()> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    // Safety: the mapping is read-only and the file is not written to
    // while the run holds it.
    let data = unsafe { Mmap::map(&file)? };
    decode_stream(&data, table, out)
}

/// Decode an in-memory log image page by page. The final page may be
/// shorter than [`PAGE_SIZE`] and is still scanned.
pub fn decode_stream(data: &[u8], table: &FormatTable, out: &mut impl Write) -> io::Result<()> {
    for (page_number, page) in data.chunks(PAGE_SIZE).enumerate() {
        tracing::debug!("Processing page {}", page_number);
        for line in scan_page(page, table) {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::crc::crc8;
    use crate::decoder::types::HEADER_LEN;

    fn frame(addr: u32, time: u32, payload: &[u8]) -> Vec<u8> {
        let size = (HEADER_LEN + payload.len()) as u8;
        let mut bytes = vec![0u8, size];
        bytes.extend_from_slice(&addr.to_le_bytes());
        bytes.extend_from_slice(&time.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes[0] = crc8(&bytes[1..]);
        bytes
    }

    #[test]
    fn test_pages_are_independent() {
        let table = FormatTable::from_entries([(1, "world"), (42, "%s %d %x")]);
        let payload: Vec<u8> = [1u32, 7, 10].iter().flat_map(|v| v.to_le_bytes()).collect();

        // Page 0 opens with an invalid sync frame (nonzero address) and
        // is abandoned wholesale; page 1 must still decode with its own
        // fresh baseline.
        let mut data = frame(5, 111, &[]);
        data.extend(frame(42, 7, &payload));
        data.resize(PAGE_SIZE, 0xAA);
        data.extend(frame(0, 77, &[]));
        data.extend(frame(42, 3, &payload));

        let mut out = Vec::new();
        decode_stream(&data, &table, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0000000077.000003 world 7 a\n"
        );
    }

    #[test]
    fn test_short_final_page_is_scanned() {
        let table = FormatTable::from_entries([(7, "tick")]);

        let mut data = frame(0, 9, &[]);
        data.extend(frame(7, 1, &[]));

        let mut out = Vec::new();
        decode_stream(&data, &table, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0000000009.000001 tick\n");
    }

    #[test]
    fn test_empty_input_yields_no_lines() {
        let mut out = Vec::new();
        decode_stream(&[], &FormatTable::default(), &mut out).unwrap();
        assert!(out.is_empty());
    }
}
