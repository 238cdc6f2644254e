//! firmlog - a binary device log decoder written in Rust
//!
//! Firmware stores log records as compact binary frames that reference
//! format strings by address instead of embedding text. This library
//! turns such a log back into readable lines, given the binary file and
//! a JSON table mapping string addresses to printf-style templates.
//!
//! ## Module Structure
//!
//! - [`decoder`] - the decode pipeline
//!   - `crc` - CRC8 frame validation
//!   - `page` - per-page frame scanning and resynchronization
//!   - `template` - format template lexing, argument decoding, rendering
//!   - `types` - frame headers, decoded arguments, output lines
//! - [`table`] - the format string table loaded from JSON

pub mod decoder;
pub mod table;
