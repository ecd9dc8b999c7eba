//! Single 80-byte header records.

use std::fmt;
use std::str;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::value::{format_general, Value};

/// Raw keyword field of the card that terminates a header.
pub const END_KEYWORD: &[u8; 8] = b"END     ";

/// One FITS header card.
///
/// The card keeps its raw text; key, value and comment are extracted on
/// demand by [`Card::parse`]. Bytes outside printable ASCII are replaced by
/// spaces on construction, so the raw text is always valid ASCII.
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
    raw: [u8; CARD_SIZE],
}

/// The interpreted contents of a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardParts {
    /// Keyword with surrounding spaces removed.
    pub key: String,
    /// `None` when the card has no `= ` value indicator.
    pub value: Option<Value>,
    /// Comment text after the `/`, trimmed. Empty if absent.
    pub comment: String,
}

fn sanitize(b: u8) -> u8 {
    if (32..=126).contains(&b) {
        b
    } else {
        b' '
    }
}

impl Card {
    /// Build a card from an 80-byte record as read from disk.
    pub fn from_bytes(bytes: &[u8; CARD_SIZE]) -> Card {
        let mut raw = [b' '; CARD_SIZE];
        for (dst, &src) in raw.iter_mut().zip(bytes.iter()) {
            *dst = sanitize(src);
        }
        Card { raw }
    }

    /// Build a card from arbitrary text, space-padded or truncated to 80
    /// bytes. No syntax checking is done.
    pub fn from_text(text: &str) -> Card {
        let mut raw = [b' '; CARD_SIZE];
        for (dst, &src) in raw.iter_mut().zip(text.as_bytes()) {
            *dst = sanitize(src);
        }
        Card { raw }
    }

    /// Build a `KEY     = value / comment` card. An overlong comment is
    /// silently cut at the card boundary.
    pub fn with_value(key: &str, value: &str, comment: &str) -> Card {
        Card::from_text(&format!("{:<8}= {} / {}", key, value, comment))
    }

    /// Integer card, value right-justified in the 20-column fixed field.
    pub fn integer(key: &str, value: i64, comment: &str) -> Card {
        Card::with_value(key, &format!("{:>20}", value), comment)
    }

    /// Floating-point card, value in `%G` notation with ten significant digits.
    pub fn double(key: &str, value: f64, comment: &str) -> Card {
        Card::with_value(key, &format!("{:>20}", format_general(value, 10)), comment)
    }

    /// The `END` card.
    pub fn end() -> Card {
        Card::from_text("END")
    }

    /// The raw 80 bytes.
    pub fn raw(&self) -> &[u8; CARD_SIZE] {
        &self.raw
    }

    /// The raw card as text.
    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.raw).unwrap_or("")
    }

    /// The keyword: first 8 bytes, spaces trimmed.
    pub fn key(&self) -> &str {
        str::from_utf8(&self.raw[..8]).unwrap_or("").trim()
    }

    /// Returns `true` if this card is the `END` keyword.
    pub fn is_end(&self) -> bool {
        &self.raw[..8] == END_KEYWORD
    }

    /// Split the card into key, value and comment.
    pub fn parse(&self) -> Result<CardParts> {
        let key = String::from(self.key());
        if &self.raw[8..10] != b"= " {
            return Ok(CardParts {
                key,
                value: None,
                comment: String::new(),
            });
        }

        let field = &self.as_str()[10..];
        let start = match field.find(|c: char| c != ' ') {
            Some(i) => i,
            None => {
                return Ok(CardParts {
                    key,
                    value: Some(Value::Missing),
                    comment: String::new(),
                })
            }
        };

        let (value, rest) = match field.as_bytes()[start] {
            b'\'' => {
                let (text, close) = match parse_quoted(&field[start + 1..]) {
                    Some(found) => found,
                    None => return Err(Error::UnterminatedString { keyword: key }),
                };
                let trimmed = String::from(text.trim_end());
                (Value::Text(trimmed), &field[start + 1 + close + 1..])
            }
            b'/' => (Value::Missing, &field[start..]),
            _ => {
                let end = field[start + 1..]
                    .find('/')
                    .map(|i| i + start + 1)
                    .unwrap_or(field.len());
                (Value::from_token(&field[start..end]), &field[end..])
            }
        };

        let rest = rest.trim();
        let comment = if rest.is_empty() {
            String::new()
        } else if let Some(text) = rest.strip_prefix('/') {
            String::from(text.trim())
        } else {
            return Err(Error::CardSyntax {
                card: String::from(self.as_str().trim()),
            });
        };

        Ok(CardParts {
            key,
            value: Some(value),
            comment,
        })
    }
}

/// Scan a quoted string body (opening quote already consumed). Returns the
/// unescaped text and the index of the closing quote.
fn parse_quoted(body: &str) -> Option<(String, usize)> {
    let bytes = body.as_bytes();
    let mut text = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                text.push('\'');
                i += 2;
                continue;
            }
            return Some((text, i));
        }
        text.push(bytes[i] as char);
        i += 1;
    }
    None
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card({:?})", self.as_str().trim_end())
    }
}
