//! Printf-style template lexing, argument decoding, and message rendering.
//!
//! Templates come from the format table and use a fixed-width subset of
//! printf: every recognized specifier consumes a known number of payload
//! bytes, decoded little-endian at a running cursor. Tokenizing is pure
//! string grammar and never touches the payload.

use std::str::FromStr;

use strum::{AsRefStr, EnumString};

use super::types::Argument;
use crate::table::FormatTable;

/// Recognized specifier codes.
#[derive(AsRefStr, Clone, Copy, Debug, EnumString, PartialEq, Eq)]
pub enum Code {
    #[strum(serialize = "c")]
    Char,
    #[strum(serialize = "d")]
    Int,
    #[strum(serialize = "u")]
    Uint,
    #[strum(serialize = "x")]
    HexLower,
    #[strum(serialize = "X")]
    HexUpper,
    #[strum(serialize = "s")]
    Str,
    #[strum(serialize = "lld")]
    Int64,
    #[strum(serialize = "llu")]
    Uint64,
}

impl Code {
    /// Number of payload bytes this specifier consumes.
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Char => 1,
            Self::Int | Self::Uint | Self::HexLower | Self::HexUpper | Self::Str => 4,
            Self::Int64 | Self::Uint64 => 8,
        }
    }
}

/// One `%` specifier as written in a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spec<'a> {
    /// The specifier exactly as written, e.g. `"%08X"`.
    pub raw: &'a str,
    pub code: Code,
    /// The `0` flag was given.
    pub zero_pad: bool,
    /// Minimum field width, when given.
    pub width: Option<usize>,
}

/// One token of a format template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// A run of text copied through unchanged.
    Literal(&'a str),
    /// A recognized specifier.
    Specifier(Spec<'a>),
    /// A `%` sequence with an unrecognized code. Consumes no payload and
    /// renders as written.
    Unknown(&'a str),
}

/// Tokenize a template. Restart by calling `tokenize` again.
pub fn tokenize(template: &str) -> Tokens<'_> {
    Tokens { rest: template }
}

/// Iterator over template tokens.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        if !self.rest.starts_with('%') {
            let end = self.rest.find('%').unwrap_or(self.rest.len());
            let (literal, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Token::Literal(literal));
        }
        // An escaped percent renders as a single literal `%`.
        if self.rest.as_bytes().get(1) == Some(&b'%') {
            let token = Token::Literal(&self.rest[..1]);
            self.rest = &self.rest[2..];
            return Some(token);
        }
        let (token, used) = lex_specifier(self.rest);
        self.rest = &self.rest[used..];
        Some(token)
    }
}

/// Lex one specifier starting at a `%`. Returns the token and the number
/// of bytes consumed. Only ASCII is ever consumed past the `%`, so the
/// caller's slice stays on a char boundary.
fn lex_specifier(s: &str) -> (Token<'_>, usize) {
    let bytes = s.as_bytes();
    let mut i = 1;

    // Optional positional index, e.g. `%1$d`. Accepted and ignored.
    let mut j = i;
    while bytes.get(j).is_some_and(u8::is_ascii_digit) {
        j += 1;
    }
    if j > i && bytes.get(j) == Some(&b'$') {
        i = j + 1;
    }

    // Flags. Only `0` affects rendering.
    let mut zero_pad = false;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'0' => {
                zero_pad = true;
                i += 1;
            }
            b'+' | b'-' | b'#' | b' ' => i += 1,
            _ => break,
        }
    }

    // Width.
    let width_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let width = s[width_start..i].parse::<usize>().ok();

    // Precision. Accepted and ignored.
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
    }

    // The code itself: `ll`-prefixed 64-bit forms, then single letters.
    let code_len = if s[i..].starts_with("lld") || s[i..].starts_with("llu") {
        3
    } else if bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        1
    } else {
        0
    };
    let end = i + code_len;

    match Code::from_str(&s[i..end]) {
        Ok(code) => (
            Token::Specifier(Spec {
                raw: &s[..end],
                code,
                zero_pad,
                width,
            }),
            end,
        ),
        Err(_) => (Token::Unknown(&s[..end]), end.max(1)),
    }
}

/// Outcome of decoding a payload against a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedArgs {
    pub values: Vec<Argument>,
    /// The payload ran out before every specifier was filled.
    pub truncated: bool,
}

/// Decode payload bytes for each recognized specifier in the template.
///
/// When the remaining payload is shorter than a specifier's width the
/// decode stops immediately and the result is marked truncated; values
/// decoded so far are kept. Unknown specifiers consume nothing.
pub fn decode_arguments(template: &str, payload: &[u8], table: &FormatTable) -> DecodedArgs {
    let mut values = Vec::new();
    let mut cursor = 0;

    for token in tokenize(template) {
        let spec = match token {
            Token::Specifier(spec) => spec,
            Token::Unknown(raw) => {
                tracing::warn!(
                    "Unknown format specifier {} in format string '{}'",
                    raw,
                    template
                );
                continue;
            }
            Token::Literal(_) => continue,
        };

        let width = spec.code.byte_width();
        if cursor + width > payload.len() {
            tracing::warn!(
                "Not enough data for format specifier {} in format string '{}'",
                spec.code.as_ref(),
                template
            );
            return DecodedArgs {
                values,
                truncated: true,
            };
        }
        let bytes = &payload[cursor..cursor + width];
        cursor += width;
        values.push(decode_one(spec.code, bytes, table));
    }

    DecodedArgs {
        values,
        truncated: false,
    }
}

fn decode_one(code: Code, bytes: &[u8], table: &FormatTable) -> Argument {
    match code {
        Code::Char => Argument::Char(bytes[0] as i8),
        Code::Int => {
            Argument::Int(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
        }
        Code::Uint => {
            let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Argument::Text(value.to_string())
        }
        Code::HexLower => {
            Argument::Uint(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64)
        }
        Code::HexUpper => {
            let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Argument::Text(format!("{:08X}", value))
        }
        Code::Str => {
            // The argument is itself a string address. The resolved text is
            // used verbatim, never expanded a second time.
            let addr = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            match table.lookup(addr) {
                Some(template) => Argument::Text(template.to_string()),
                None => Argument::Text(format!("<unknown string at {}>", addr)),
            }
        }
        Code::Int64 => Argument::Int(i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        Code::Uint64 => Argument::Uint(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
    }
}

/// Render a message by substituting decoded arguments into the template.
///
/// A truncated decode degrades the whole line: every specifier slot is
/// replaced by its own literal text. A structurally valid frame always
/// yields a line.
pub fn render_message(template: &str, payload: &[u8], table: &FormatTable) -> String {
    let decoded = decode_arguments(template, payload, table);
    if decoded.truncated {
        tracing::warn!(
            "Falling back to literal specifiers for format string '{}'",
            template
        );
        return tokenize(template)
            .map(|token| match token {
                Token::Literal(text) => text,
                Token::Specifier(spec) => spec.raw,
                Token::Unknown(raw) => raw,
            })
            .collect();
    }

    let mut values = decoded.values.into_iter();
    let mut message = String::new();
    for token in tokenize(template) {
        match token {
            Token::Literal(text) => message.push_str(text),
            Token::Unknown(raw) => message.push_str(raw),
            Token::Specifier(spec) => {
                // An untruncated decode filled every specifier slot.
                if let Some(value) = values.next() {
                    render_value(&mut message, &spec, &value);
                }
            }
        }
    }
    message
}

fn render_value(out: &mut String, spec: &Spec<'_>, value: &Argument) {
    let text = match value {
        Argument::Char(c) => {
            let byte = *c as u8;
            if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte).to_string()
            } else {
                c.to_string()
            }
        }
        Argument::Int(v) => pad_numeric(&v.to_string(), spec, *v < 0),
        Argument::Uint(v) => {
            let rendered = if spec.code == Code::HexLower {
                format!("{:x}", v)
            } else {
                v.to_string()
            };
            pad_numeric(&rendered, spec, false)
        }
        Argument::Text(text) => match spec.width {
            Some(width) => format!("{:>width$}", text),
            None => text.clone(),
        },
    };
    out.push_str(&text);
}

/// Apply the zero flag and minimum width to a rendered number.
fn pad_numeric(rendered: &str, spec: &Spec<'_>, negative: bool) -> String {
    let Some(width) = spec.width else {
        return rendered.to_string();
    };
    if !spec.zero_pad {
        return format!("{:>width$}", rendered);
    }
    if negative {
        // Zeros go between the sign and the digits.
        let digits = &rendered[1..];
        let pad = width.saturating_sub(rendered.len());
        return format!("-{}{}", "0".repeat(pad), digits);
    }
    format!("{:0>width$}", rendered)
}
