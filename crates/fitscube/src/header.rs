//! FITS header reading, lookup, editing, and writing.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::block::{padded_byte_len, CARD_SIZE, HEADER_PAD_BYTE};
use crate::card::Card;
use crate::error::{Error, Result};
use crate::value::Value;

/// Sort priority of cards that have no fixed position.
const UNPRIORITIZED: u32 = 1_000_000;

/// Position class of a keyword when the header is written out. Mandatory
/// keywords come first, `END` always last, everything else keeps its order.
fn keyword_priority(key: &str) -> u32 {
    match key {
        "SIMPLE" => 0,
        "BITPIX" => 1,
        "NAXIS" => 2,
        "NAXIS1" => 3,
        "NAXIS2" => 4,
        "NAXIS3" => 5,
        "NAXIS4" => 6,
        "NAXIS5" => 7,
        "END" => u32::MAX,
        _ => UNPRIORITIZED,
    }
}

/// An ordered collection of header cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
    data_offset: u64,
}

impl Header {
    /// An empty header, for building one card by card.
    pub fn new() -> Header {
        Header::default()
    }

    /// Read cards one at a time until the `END` card.
    ///
    /// Any short read is fatal. The data offset is the number of bytes read
    /// rounded up to the next 2880-byte block.
    pub fn read<R: Read>(reader: &mut R) -> Result<Header> {
        let mut cards = Vec::new();
        let mut bytes_read: u64 = 0;
        loop {
            let mut record = [0u8; CARD_SIZE];
            reader.read_exact(&mut record)?;
            bytes_read += CARD_SIZE as u64;

            let card = Card::from_bytes(&record);
            let is_end = card.is_end();
            cards.push(card);
            if is_end {
                break;
            }
        }
        Ok(Header {
            cards,
            data_offset: padded_byte_len(bytes_read),
        })
    }

    /// Open `path` and read its primary header.
    pub fn from_path(path: &Path) -> Result<Header> {
        let mut file = File::open(path).map_err(|e| Error::file(path, e))?;
        Header::read(&mut file).map_err(|e| Error::in_file(path, e))
    }

    /// Byte offset of the data block following a parsed header. Zero for
    /// headers built in memory.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// All cards in file order, END included when present.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when the header holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Position of the first card whose trimmed keyword equals `key`.
    pub fn find_index(&self, key: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.key() == key)
    }

    /// Value of `key`, or `default` if no such card exists.
    ///
    /// A card that exists but has no value indicator yields
    /// [`Value::Missing`]. Only a malformed card makes this fail.
    pub fn get_value(&self, key: &str, default: Option<Value>) -> Result<Option<Value>> {
        match self.find_index(key) {
            Some(i) => Ok(Some(self.cards[i].parse()?.value.unwrap_or(Value::Missing))),
            None => Ok(default),
        }
    }

    fn required(&self, key: &str) -> Result<Value> {
        self.get_value(key, None)?
            .ok_or_else(|| Error::MissingKeyword(String::from(key)))
    }

    /// Integer value of a required keyword.
    ///
    /// Fails with [`Error::MissingKeyword`] when the card is absent and
    /// [`Error::InvalidValue`] when its value is not an integer.
    pub fn int_value(&self, key: &str) -> Result<i64> {
        let value = self.required(key)?;
        to_int(key, &value)
    }

    /// Integer value of `key`, or `default` when the card is absent.
    pub fn int_value_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get_value(key, None)? {
            Some(value) => to_int(key, &value),
            None => Ok(default),
        }
    }

    /// Numeric value of a required keyword. Integers are widened.
    pub fn double_value(&self, key: &str) -> Result<f64> {
        let value = self.required(key)?;
        to_double(key, &value)
    }

    /// Numeric value of `key`, or `default` when the card is absent.
    pub fn double_value_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.get_value(key, None)? {
            Some(value) => to_double(key, &value),
            None => Ok(default),
        }
    }

    /// Text of a required keyword. Non-string values are rendered as text.
    pub fn string_value(&self, key: &str) -> Result<String> {
        Ok(self.required(key)?.as_string())
    }

    /// Text of `key`, or `default` when the card is absent.
    pub fn string_value_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_value(key, None)?
            .map(|v| v.as_string())
            .unwrap_or_else(|| String::from(default)))
    }

    /// Replace the card for `key`, or append one if the key is absent.
    pub fn set_int_value(&mut self, key: &str, value: i64, comment: &str) {
        self.upsert(key, Card::integer(key, value, comment));
    }

    /// Replace the card for `key`, or append one if the key is absent.
    pub fn set_double_value(&mut self, key: &str, value: f64, comment: &str) {
        self.upsert(key, Card::double(key, value, comment));
    }

    fn upsert(&mut self, key: &str, card: Card) {
        match self.find_index(key) {
            Some(i) => self.cards[i] = card,
            None => self.cards.push(card),
        }
    }

    /// Append a card built from raw text, padded or cut to 80 bytes.
    pub fn add_raw(&mut self, text: &str) {
        self.cards.push(Card::from_text(text));
    }

    /// Append an already-built card.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Serialize the header: cards stably sorted by keyword priority, then
    /// space-padded to a whole number of blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut order: Vec<&Card> = self.cards.iter().collect();
        order.sort_by_key(|c| keyword_priority(c.key()));

        let total = padded_byte_len((order.len() * CARD_SIZE) as u64) as usize;
        let mut buf = Vec::with_capacity(total);
        for card in order {
            buf.extend_from_slice(card.raw());
        }
        buf.resize(total, HEADER_PAD_BYTE);
        buf
    }

    /// Write the serialized header, returning the number of bytes written.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

fn to_int(key: &str, value: &Value) -> Result<i64> {
    value.as_int().ok_or_else(|| Error::InvalidValue {
        keyword: String::from(key),
        value: value.to_string(),
        expected: "an integer",
    })
}

fn to_double(key: &str, value: &Value) -> Result<f64> {
    value.as_double().ok_or_else(|| Error::InvalidValue {
        keyword: String::from(key),
        value: value.to_string(),
        expected: "a double",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use std::io::Cursor;

    fn header_bytes(lines: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        for line in lines {
            data.extend_from_slice(Card::from_text(line).raw());
        }
        let padded = padded_byte_len(data.len() as u64) as usize;
        data.resize(padded, b' ');
        data
    }

    fn sample_header() -> Header {
        let data = header_bytes(&[
            "SIMPLE  =                    T / conforms to FITS standard",
            "BITPIX  =                  -32",
            "NAXIS   =                    3",
            "NAXIS1  =                   10",
            "NAXIS2  =                   20",
            "NAXIS3  =                    5",
            "CTYPE3  = 'FREQ    '",
            "CDELT3  =           -2.5000E+04",
            "OBJECT  = 'it''s ok '          / target",
            "END",
        ]);
        Header::read(&mut Cursor::new(data)).unwrap()
    }

    // ---- reading ----

    #[test]
    fn read_stops_at_end() {
        let h = sample_header();
        assert_eq!(h.len(), 10);
        assert!(h.cards()[9].is_end());
        assert_eq!(h.data_offset(), BLOCK_SIZE);
    }

    #[test]
    fn read_leaves_stream_after_end_card() {
        let mut cursor = Cursor::new(header_bytes(&["SIMPLE  =                    T", "END"]));
        Header::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 2 * CARD_SIZE as u64);
    }

    #[test]
    fn read_data_offset_spans_blocks() {
        let mut lines: Vec<String> = (0..36).map(|i| format!("KEY{:<5}= {:>20}", i, i)).collect();
        lines.push(String::from("END"));
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let h = Header::read(&mut Cursor::new(header_bytes(&refs))).unwrap();
        assert_eq!(h.len(), 37);
        assert_eq!(h.data_offset(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn read_without_end_is_io_error() {
        let data = header_bytes(&["SIMPLE  =                    T"]);
        let err = Header::read(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn read_partial_card_is_io_error() {
        let data = b"SIMPLE  =      ".to_vec();
        assert!(matches!(Header::read(&mut Cursor::new(data)), Err(Error::Io(_))));
    }

    #[test]
    fn end_must_be_the_bare_keyword() {
        let data = header_bytes(&["ENDIAN  = 'BIG'", "END"]);
        let h = Header::read(&mut Cursor::new(data)).unwrap();
        assert_eq!(h.len(), 2);
    }

    // ---- lookup ----

    #[test]
    fn find_index_first_match() {
        let mut h = sample_header();
        h.add_raw("NAXIS1  =                  999");
        assert_eq!(h.find_index("NAXIS1"), Some(3));
        assert_eq!(h.int_value("NAXIS1").unwrap(), 10);
        assert_eq!(h.find_index("naxis1"), None);
        assert_eq!(h.find_index("MISSING"), None);
    }

    #[test]
    fn get_value_defaults() {
        let h = sample_header();
        assert_eq!(h.get_value("NOPE", None).unwrap(), None);
        assert_eq!(
            h.get_value("NOPE", Some(Value::Integer(7))).unwrap(),
            Some(Value::Integer(7))
        );
        assert_eq!(h.get_value("NAXIS", None).unwrap(), Some(Value::Integer(3)));
    }

    #[test]
    fn typed_required_accessors() {
        let h = sample_header();
        assert_eq!(h.int_value("BITPIX").unwrap(), -32);
        assert_eq!(h.double_value("CDELT3").unwrap(), -25000.0);
        assert_eq!(h.double_value("NAXIS1").unwrap(), 10.0);
        assert_eq!(h.string_value("SIMPLE").unwrap(), "T");
        assert_eq!(h.string_value("CTYPE3").unwrap(), "FREQ");
        assert_eq!(h.string_value("OBJECT").unwrap(), "it's ok");
    }

    #[test]
    fn required_accessor_missing_key() {
        let h = sample_header();
        assert!(matches!(h.int_value("BLANK"), Err(Error::MissingKeyword(ref k)) if k == "BLANK"));
        assert!(matches!(h.double_value("CRVAL3"), Err(Error::MissingKeyword(_))));
        assert!(matches!(h.string_value("BUNIT"), Err(Error::MissingKeyword(_))));
    }

    #[test]
    fn defaulted_accessors() {
        let h = sample_header();
        assert_eq!(h.int_value_or("NAXIS4", 1).unwrap(), 1);
        assert_eq!(h.double_value_or("BSCALE", 1.0).unwrap(), 1.0);
        assert_eq!(h.string_value_or("CUNIT3", "Hz").unwrap(), "Hz");
        assert_eq!(h.int_value_or("NAXIS3", 1).unwrap(), 5);
    }

    #[test]
    fn unconvertible_value_is_type_error_even_with_default() {
        let h = sample_header();
        assert!(matches!(h.int_value("CTYPE3"), Err(Error::InvalidValue { .. })));
        assert!(matches!(h.int_value_or("CDELT3", 0), Err(Error::InvalidValue { .. })));
        assert!(matches!(h.double_value_or("SIMPLE", 0.0), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn malformed_card_surfaces_on_lookup() {
        let mut h = Header::new();
        h.add_raw("OBJECT  = 'unterminated");
        assert!(matches!(
            h.get_value("OBJECT", None),
            Err(Error::UnterminatedString { .. })
        ));
    }

    // ---- editing ----

    #[test]
    fn set_existing_key_replaces_in_place() {
        let mut h = sample_header();
        let before = h.len();
        h.set_int_value("NAXIS3", 42, "total frames");
        assert_eq!(h.len(), before);
        assert_eq!(h.find_index("NAXIS3"), Some(5));
        assert_eq!(h.int_value("NAXIS3").unwrap(), 42);
    }

    #[test]
    fn set_absent_key_appends() {
        let mut h = sample_header();
        let before = h.len();
        h.set_double_value("CRVAL3", 1.420405752e9, "");
        assert_eq!(h.len(), before + 1);
        assert_eq!(h.find_index("CRVAL3"), Some(before));
        assert_eq!(h.double_value("CRVAL3").unwrap(), 1.420405752e9);
    }

    #[test]
    fn add_raw_pads_to_card_size() {
        let mut h = Header::new();
        h.add_raw("HISTORY short");
        assert_eq!(h.cards()[0].raw().len(), CARD_SIZE);
        assert_eq!(h.cards()[0].key(), "HISTORY");
    }

    // ---- writing ----

    #[test]
    fn write_sorts_by_priority() {
        let mut h = Header::new();
        h.add_raw("OBJECT  = 'M31'");
        h.add_raw("END");
        h.set_int_value("NAXIS1", 4, "");
        h.set_int_value("NAXIS", 3, "");
        h.add_raw("CTYPE1  = 'RA---SIN'");
        h.set_int_value("BITPIX", 16, "");
        h.add_raw("SIMPLE  =                    T");

        let bytes = h.to_bytes();
        let keys: Vec<String> = bytes[..h.len() * CARD_SIZE]
            .chunks(CARD_SIZE)
            .map(|c| String::from_utf8_lossy(&c[..8]).trim().to_string())
            .collect();
        assert_eq!(
            keys,
            ["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "OBJECT", "CTYPE1", "END"]
        );
    }

    #[test]
    fn write_pads_with_spaces() {
        let h = sample_header();
        let mut out = Vec::new();
        let n = h.write(&mut out).unwrap();
        assert_eq!(n, BLOCK_SIZE);
        assert_eq!(out.len() as u64, BLOCK_SIZE);
        assert!(out[h.len() * CARD_SIZE..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn write_then_read_preserves_content() {
        let h = sample_header();
        let reread = Header::read(&mut Cursor::new(h.to_bytes())).unwrap();
        assert_eq!(reread.len(), h.len());
        for card in h.cards() {
            let key = card.key();
            let i = reread.find_index(key).unwrap();
            assert_eq!(reread.cards()[i].parse().unwrap(), card.parse().unwrap());
        }
    }

    #[test]
    fn write_failure_is_io_error() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        assert!(matches!(sample_header().write(&mut Full), Err(Error::Io(_))));
    }
}
