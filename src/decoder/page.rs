//! Per-page frame scanning and corruption recovery.
//!
//! Pages are decoded independently. A leading sync frame establishes the
//! timestamp baseline, then message frames follow until the page runs
//! out. Faults fall into three buckets: an invalid leading sync frame
//! abandons the page, a message CRC mismatch skips one frame by its
//! declared size, and a structural fault (a frame span leaving the page,
//! or a size below the header length) triggers byte-level
//! resynchronization.

use super::crc::crc8;
use super::template::render_message;
use super::types::{FrameHeader, LogLine, HEADER_LEN};
use crate::table::FormatTable;

/// Fixed page size of the on-device log storage.
pub const PAGE_SIZE: usize = 512;

/// Decode every recoverable message frame in one page.
///
/// Returns the rendered lines in frame order. Malformed content never
/// fails the scan; it is reported on the diagnostic channel and recovered
/// or skipped.
pub fn scan_page(page: &[u8], table: &FormatTable) -> Vec<LogLine> {
    let mut lines = Vec::new();
    let mut offset = 0;

    // The outer scan expects a sync frame at `offset`; it is re-entered
    // only by resynchronization after a structural fault.
    'page: while let Some(header) = FrameHeader::parse(remaining(page, offset)) {
        let Some(end) = frame_end(page, offset, header.size) else {
            match recover(page, offset) {
                Some(next) => {
                    offset = next;
                    continue 'page;
                }
                None => break 'page,
            }
        };
        let expected = crc8(&page[offset + 1..end]);
        tracing::debug!(
            "SyncFrame at offset {}: crc8 {} (expected {}), size {}, addr {}, timestamp {}",
            offset,
            header.crc,
            expected,
            header.size,
            header.addr,
            header.time
        );
        if header.addr != 0 || expected != header.crc {
            // First frame or nothing: a page without a valid sync frame
            // has no timestamp baseline, so none of it is decoded.
            tracing::debug!("Invalid SyncFrame at offset {}; abandoning page", offset);
            break 'page;
        }
        let baseline = header.time;
        offset = end;

        while let Some(header) = FrameHeader::parse(remaining(page, offset)) {
            let Some(end) = frame_end(page, offset, header.size) else {
                match recover(page, offset) {
                    Some(next) => {
                        offset = next;
                        continue 'page;
                    }
                    None => break 'page,
                }
            };
            let expected = crc8(&page[offset + 1..end]);
            tracing::debug!(
                "Message at offset {}: crc8 {} (expected {}), size {}, addr {}, time offset {}us",
                offset,
                header.crc,
                expected,
                header.size,
                header.addr,
                header.time
            );
            if expected != header.crc {
                // Skip by the declared size even though it is unverified;
                // a corrupted size can mis-advance the cursor.
                tracing::warn!("Invalid message at offset {}", offset);
                offset = end;
                continue;
            }

            let payload = &page[offset + HEADER_LEN..end];
            match table.lookup(header.addr) {
                Some(template) => lines.push(LogLine {
                    seconds: baseline,
                    micros: header.time,
                    message: render_message(template, payload, table),
                }),
                None => tracing::warn!(
                    "Unknown format string address {} at offset {}",
                    header.addr,
                    offset
                ),
            }
            offset = end;
        }
        break 'page;
    }

    lines
}

fn remaining(page: &[u8], offset: usize) -> &[u8] {
    page.get(offset..).unwrap_or(&[])
}

/// Bounds-check a frame's span, returning the offset one past its end.
/// `None` marks a structural fault: a size below the header length, or a
/// span past the end of the page.
fn frame_end(page: &[u8], offset: usize, size: u8) -> Option<usize> {
    let size = size as usize;
    if size < HEADER_LEN {
        return None;
    }
    let end = offset + size;
    (end <= page.len()).then_some(end)
}

fn recover(page: &[u8], offset: usize) -> Option<usize> {
    tracing::warn!("Corrupt frame at offset {}; resynchronizing", offset);
    let next = resync(page, offset);
    match next {
        Some(next) => tracing::debug!("Resynchronized to offset {}", next),
        None => tracing::debug!("No frame boundary found; giving up on page"),
    }
    next
}

/// Linear resynchronization after a structural fault: scan forward from
/// the fault one byte at a time for a zero byte, and resume scanning ten
/// bytes past it. Best-effort only; the zero byte is not guaranteed to be
/// a true frame boundary. Returns `None` when no zero byte remains.
pub fn resync(page: &[u8], from: usize) -> Option<usize> {
    let zero = page.get(from..)?.iter().position(|&b| b == 0)?;
    Some(from + zero + HEADER_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a frame with a valid CRC: header `{crc, size, addr, time}`
    /// followed by the payload.
    fn frame(addr: u32, time: u32, payload: &[u8]) -> Vec<u8> {
        let size = (HEADER_LEN + payload.len()) as u8;
        let mut bytes = vec![0u8, size];
        bytes.extend_from_slice(&addr.to_le_bytes());
        bytes.extend_from_slice(&time.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes[0] = crc8(&bytes[1..]);
        bytes
    }

    fn sync_frame(timestamp: u32) -> Vec<u8> {
        frame(0, timestamp, &[])
    }

    fn message_payload() -> Vec<u8> {
        // For the "%s %d %x" template: address of "world", 7, 10.
        [1u32, 7, 10].iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn table() -> FormatTable {
        FormatTable::from_entries([(1, "world"), (42, "%s %d %x"), (43, "%d %d")])
    }

    #[test]
    fn test_round_trip() {
        let mut page = sync_frame(1234);
        page.extend(frame(42, 7, &message_payload()));

        let lines = scan_page(&page, &table());
        assert_eq!(
            lines,
            vec![LogLine {
                seconds: 1234,
                micros: 7,
                message: "world 7 a".to_string(),
            }]
        );
        assert_eq!(lines[0].to_string(), "0000001234.000007 world 7 a");
    }

    #[test]
    fn test_sync_frame_with_nonzero_addr_abandons_page() {
        let mut page = frame(5, 1234, &[]);
        page.extend(frame(42, 7, &message_payload()));

        assert!(scan_page(&page, &table()).is_empty());
    }

    #[test]
    fn test_sync_frame_with_bad_crc_abandons_page() {
        let mut page = sync_frame(1234);
        page[0] ^= 0xFF;
        page.extend(frame(42, 7, &message_payload()));

        assert!(scan_page(&page, &table()).is_empty());
    }

    #[test]
    fn test_corrupt_message_skipped_by_declared_size() {
        let mut page = sync_frame(1234);
        let mut bad = frame(42, 5, &message_payload());
        bad[0] ^= 0xFF;
        page.extend(bad);
        page.extend(frame(42, 9, &message_payload()));

        let lines = scan_page(&page, &table());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].micros, 9);
    }

    #[test]
    fn test_unknown_address_consumes_frame() {
        let mut page = sync_frame(1234);
        page.extend(frame(99, 5, &[]));
        page.extend(frame(42, 9, &message_payload()));

        // The unknown frame yields no line but the cursor still advances
        // over it, so the next frame decodes.
        let lines = scan_page(&page, &table());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].micros, 9);
    }

    #[test]
    fn test_short_payload_degrades_line() {
        let mut page = sync_frame(1234);
        page.extend(frame(43, 5, &7i32.to_le_bytes()));

        let lines = scan_page(&page, &table());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "%d %d");
    }

    #[test]
    fn test_resync_recovers_at_next_sync_frame() {
        let mut page = sync_frame(100);
        // A header whose declared size leaves the page: structural fault.
        page.extend_from_slice(&[0xAA; 10]);
        // Resynchronization hunts for this zero byte and lands ten bytes
        // past it, exactly at the second sync frame.
        page.push(0x00);
        page.extend_from_slice(&[0xBB; 9]);
        page.extend(sync_frame(200));
        page.extend(frame(42, 9, &message_payload()));

        let lines = scan_page(&page, &table());
        assert_eq!(
            lines,
            vec![LogLine {
                seconds: 200,
                micros: 9,
                message: "world 7 a".to_string(),
            }]
        );
    }

    #[test]
    fn test_resync_gives_up_without_zero_byte() {
        let mut page = sync_frame(100);
        page.extend_from_slice(&[0xAA; 10]);
        page.extend_from_slice(&[0xBB; 20]);

        assert!(scan_page(&page, &table()).is_empty());
    }

    #[test]
    fn test_undersized_header_is_a_structural_fault() {
        let mut page = sync_frame(100);
        // size 5 violates the header-size invariant; without a zero byte
        // afterwards the page scan stops rather than spinning.
        page.extend_from_slice(&[0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01]);

        assert!(scan_page(&page, &table()).is_empty());
    }

    #[test]
    fn test_short_page_yields_nothing() {
        assert!(scan_page(&[], &table()).is_empty());
        assert!(scan_page(&[0x00; 9], &table()).is_empty());
    }

    #[test]
    fn test_resync_positions() {
        assert_eq!(resync(&[1, 2, 0, 4], 0), Some(12));
        assert_eq!(resync(&[1, 0, 3], 1), Some(11));
        assert_eq!(resync(&[1, 2, 3], 0), None);
        assert_eq!(resync(&[0, 1], 5), None);
    }
}
