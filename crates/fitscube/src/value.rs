//! Typed FITS card values.
//!
//! Cards store their value as text; this module classifies that text once into
//! a [`Value`] and provides the lossy conversions the header accessors need.

use std::fmt;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The card has a value indicator but nothing after it.
    Missing,
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// Character string. Quoted strings have their quotes removed and `''`
    /// collapsed; unquoted tokens that are not numbers land here verbatim.
    Text(String),
}

impl Value {
    /// Classify an unquoted value token.
    pub fn from_token(token: &str) -> Value {
        let token = token.trim();
        if token.is_empty() {
            return Value::Missing;
        }
        if token == "T" {
            return Value::Logical(true);
        }
        if token == "F" {
            return Value::Logical(false);
        }

        // Integer: no decimal point or exponent characters.
        if !token.contains(&['.', 'E', 'e', 'D', 'd'][..]) {
            if let Ok(n) = token.parse::<i64>() {
                return Value::Integer(n);
            }
        }

        match parse_float_str(token) {
            Some(f) => Value::Float(f),
            None => Value::Text(String::from(token)),
        }
    }

    /// Integer view. Only integer tokens convert.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Floating-point view. Integers are promoted.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Textual view, always available.
    pub fn as_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Logical(true) => f.write_str("T"),
            Value::Logical(false) => f.write_str("F"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(v) => f.write_str(&format_general(*v, 10)),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Parse a float string, handling FITS `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.replace('D', "E").replace('d', "e");
    normalized.parse::<f64>().ok()
}

/// Format `v` the way C's `%.{precision}G` does: fixed notation for moderate
/// exponents, scientific otherwise, trailing zeros removed.
pub fn format_general(v: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if v == 0.0 {
        return String::from("0");
    }
    if v.is_nan() {
        return String::from("NAN");
    }
    if v.is_infinite() {
        return String::from(if v > 0.0 { "INF" } else { "-INF" });
    }

    // Rounding to `precision` digits decides the exponent, so ask the
    // formatter rather than computing log10.
    let sci = format!("{:.*e}", precision - 1, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{:02}", exp.unsigned_abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let fixed = format!("{:.*}", decimals, v);
        String::from(strip_fraction_zeros(&fixed))
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- token classification ----

    #[test]
    fn token_logical() {
        assert_eq!(Value::from_token("T"), Value::Logical(true));
        assert_eq!(Value::from_token("  F "), Value::Logical(false));
    }

    #[test]
    fn token_integer() {
        assert_eq!(Value::from_token("42"), Value::Integer(42));
        assert_eq!(Value::from_token("-32"), Value::Integer(-32));
        assert_eq!(Value::from_token("+7"), Value::Integer(7));
    }

    #[test]
    fn token_float_forms() {
        assert_eq!(Value::from_token("9.80665"), Value::Float(9.80665));
        assert_eq!(Value::from_token("1.234E+05"), Value::Float(1.234e5));
        assert_eq!(Value::from_token("-2.5D-03"), Value::Float(-2.5e-3));
        assert_eq!(Value::from_token("1E3"), Value::Float(1000.0));
    }

    #[test]
    fn token_empty_is_missing() {
        assert_eq!(Value::from_token(""), Value::Missing);
        assert_eq!(Value::from_token("     "), Value::Missing);
    }

    #[test]
    fn token_unparseable_is_text() {
        assert_eq!(Value::from_token("bogus"), Value::Text(String::from("bogus")));
        assert_eq!(Value::from_token("1.2.3"), Value::Text(String::from("1.2.3")));
    }

    // ---- conversions ----

    #[test]
    fn as_int_rejects_floats_and_text() {
        assert_eq!(Value::Integer(3).as_int(), Some(3));
        assert_eq!(Value::Float(3.0).as_int(), None);
        assert_eq!(Value::Text(String::from("3")).as_int(), None);
        assert_eq!(Value::Missing.as_int(), None);
    }

    #[test]
    fn as_double_promotes_integers() {
        assert_eq!(Value::Integer(-4).as_double(), Some(-4.0));
        assert_eq!(Value::Float(0.5).as_double(), Some(0.5));
        assert_eq!(Value::Logical(true).as_double(), None);
    }

    #[test]
    fn as_string_views() {
        assert_eq!(Value::Logical(true).as_string(), "T");
        assert_eq!(Value::Integer(16).as_string(), "16");
        assert_eq!(Value::Text(String::from("FREQ")).as_string(), "FREQ");
        assert_eq!(Value::Missing.as_string(), "");
    }

    #[test]
    fn display_text_requotes() {
        assert_eq!(Value::Text(String::from("it's")).to_string(), "'it''s'");
    }

    // ---- general float formatting ----

    #[test]
    fn general_fixed_range() {
        assert_eq!(format_general(1.0, 10), "1");
        assert_eq!(format_general(-0.5, 10), "-0.5");
        assert_eq!(format_general(2000.0, 10), "2000");
        assert_eq!(format_general(123.456, 10), "123.456");
        assert_eq!(format_general(0.0001, 10), "0.0001");
        assert_eq!(format_general(1.420405752e9, 10), "1420405752");
    }

    #[test]
    fn general_scientific_range() {
        assert_eq!(format_general(1.25e10, 10), "1.25E+10");
        assert_eq!(format_general(1.0e10, 10), "1E+10");
        assert_eq!(format_general(-2.5e-5, 10), "-2.5E-05");
        assert_eq!(format_general(1.0e100, 10), "1E+100");
    }

    #[test]
    fn general_rounding_promotes_exponent() {
        // 9999999999.6 rounds to 1.000000000E+10 at ten digits
        assert_eq!(format_general(9_999_999_999.6, 10), "1E+10");
    }

    #[test]
    fn general_zero_and_specials() {
        assert_eq!(format_general(0.0, 10), "0");
        assert_eq!(format_general(f64::NAN, 10), "NAN");
        assert_eq!(format_general(f64::NEG_INFINITY, 10), "-INF");
    }

    #[test]
    fn general_round_trips_single_precision() {
        for &f in &[3.0517578e-5f32, 1.0e-3, 299_792.47, -17.125, 1.420_405_8e9] {
            let text = format_general(f as f64, 10);
            let back = Value::from_token(&text).as_double().unwrap() as f32;
            assert_eq!(back, f, "round trip of {f} via {text}");
        }
    }
}
