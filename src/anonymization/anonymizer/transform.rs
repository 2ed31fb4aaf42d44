//! Per-field value transforms
//!
//! A [`FieldTransform`] turns one stored JSON value into its anonymized form and,
//! for reversible transforms, back again under the same [`EncryptionContext`].
//! Reversal restores the exact original value, representation included; inputs
//! whose text could not be reproduced are rejected when anonymizing.
//! `null` values are never transformed.

use crate::anonymization::encryption::{
    decrypt_email, decrypt_iban, decrypt_message, encrypt_email, encrypt_iban, encrypt_message,
    hash_text, EncryptionContext, LETTERS,
};
use crate::domain::errors::CustodianError;
use crate::domain::result::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Range of the decimal offset, in hundredths
const DECIMAL_RANGE: u128 = 10_000;

/// Decimal places of the decimal offset
const DECIMAL_PLACES: u32 = 2;

/// Range of the integer offset
const INTEGER_RANGE: u128 = 10_000;

/// Range of the date shift, in days
const DATE_RANGE_DAYS: u128 = 364;

/// Range of the datetime shift, in seconds
const DATETIME_RANGE_SECONDS: u128 = 365 * 24 * 60 * 60 - 1;

/// Length of `YYYY-MM-DDTHH:MM:SS`
const DATETIME_HEAD_LEN: usize = 19;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Transform applied to one anonymizable field
///
/// Configured by name (`"text"`, `"email"`, ...) or, for static placeholders,
/// as `{ static = <value> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    /// Polyalphabetic shift over printable ASCII
    Text,
    /// Email address kept syntactically valid, TLD preserved
    Email,
    /// Fixed-point decimal shifted by a key-derived amount
    Decimal,
    /// Integer shifted by a key-derived amount
    Integer,
    /// Date (`YYYY-MM-DD`) or RFC 3339 datetime moved into the past
    Date,
    /// IPv4/IPv6 address with shifted octets or segments
    IpAddress,
    /// IBAN with country code and check digits kept
    Iban,
    /// Strings, numbers and booleans inside a JSON document
    Json,
    /// Truncated SHA-256 digest (irreversible)
    Hash,
    /// Fixed placeholder value (irreversible)
    Static(Value),
}

impl FieldTransform {
    /// Whether the original value can be recomputed from the anonymized one
    pub fn is_reversible(&self) -> bool {
        !matches!(self, FieldTransform::Hash | FieldTransform::Static(_))
    }

    /// Transform name as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            FieldTransform::Text => "text",
            FieldTransform::Email => "email",
            FieldTransform::Decimal => "decimal",
            FieldTransform::Integer => "integer",
            FieldTransform::Date => "date",
            FieldTransform::IpAddress => "ip_address",
            FieldTransform::Iban => "iban",
            FieldTransform::Json => "json",
            FieldTransform::Hash => "hash",
            FieldTransform::Static(_) => "static",
        }
    }

    /// Anonymizes a value
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Encryption`] if the value does not have the shape
    /// the transform expects (e.g. a number for an email field).
    pub fn anonymize(&self, value: &Value, context: &EncryptionContext) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldTransform::Hash => Ok(Value::String(match value {
                Value::String(s) => hash_text(s),
                other => hash_text(&other.to_string()),
            })),
            FieldTransform::Static(placeholder) => Ok(placeholder.clone()),
            _ => self.translate(value, context, true),
        }
    }

    /// Recomputes the original value
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Encryption`] for irreversible transforms or
    /// malformed values.
    pub fn deanonymize(&self, value: &Value, context: &EncryptionContext) -> Result<Value> {
        if !self.is_reversible() {
            return Err(CustodianError::Encryption(format!(
                "Transform '{}' cannot be reversed",
                self.name()
            )));
        }
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.translate(value, context, false)
    }

    fn translate(&self, value: &Value, context: &EncryptionContext, encrypt: bool) -> Result<Value> {
        let key = context.key();
        match self {
            FieldTransform::Text => {
                let text = expect_str(self, value)?;
                Ok(Value::String(if encrypt {
                    encrypt_message(key, text, LETTERS)
                } else {
                    decrypt_message(key, text, LETTERS)
                }))
            }
            FieldTransform::Email => {
                let email = expect_str(self, value)?;
                let translated = if encrypt {
                    encrypt_email(key, email)?
                } else {
                    decrypt_email(key, email)?
                };
                Ok(Value::String(translated))
            }
            FieldTransform::Decimal => shift_decimal(value, context.numeric_key(), encrypt),
            FieldTransform::Integer => {
                let offset = 1 + (context.numeric_key() % INTEGER_RANGE) as i64;
                shift_integer(self, value, offset, encrypt)
            }
            FieldTransform::Date => shift_date(value, context.numeric_key(), encrypt),
            FieldTransform::IpAddress => shift_ip(value, key, encrypt),
            FieldTransform::Iban => {
                let iban = expect_str(self, value)?;
                let translated = if encrypt {
                    encrypt_iban(key, iban)?
                } else {
                    decrypt_iban(key, iban)?
                };
                Ok(Value::String(translated))
            }
            FieldTransform::Json => translate_json(value, context, encrypt),
            FieldTransform::Hash | FieldTransform::Static(_) => Err(CustodianError::Encryption(
                format!("Transform '{}' cannot be reversed", self.name()),
            )),
        }
    }
}

impl fmt::Display for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn expect_str<'a>(transform: &FieldTransform, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        CustodianError::Encryption(format!(
            "Transform '{}' expects a string, got {value}",
            transform.name()
        ))
    })
}

fn shift_integer(
    transform: &FieldTransform,
    value: &Value,
    offset: i64,
    encrypt: bool,
) -> Result<Value> {
    let delta = if encrypt { offset } else { -offset };
    let overflow = || {
        CustodianError::Encryption(format!("Integer {value} is out of range for anonymization"))
    };
    match value {
        Value::Number(n) => {
            let n = n.as_i64().ok_or_else(|| {
                CustodianError::Encryption(format!(
                    "Transform '{}' expects an integer, got {value}",
                    transform.name()
                ))
            })?;
            Ok(Value::from(n.checked_add(delta).ok_or_else(overflow)?))
        }
        Value::String(s) => {
            let n = s
                .parse::<i64>()
                .ok()
                .filter(|n| n.to_string() == *s)
                .ok_or_else(|| CustodianError::Encryption(format!("'{s}' is not an integer")))?;
            Ok(Value::String(n.checked_add(delta).ok_or_else(overflow)?.to_string()))
        }
        _ => Err(CustodianError::Encryption(format!(
            "Transform '{}' expects an integer, got {value}",
            transform.name()
        ))),
    }
}

/// Decimal number held as integer units at a fixed scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fixed {
    units: i128,
    scale: u32,
}

impl Fixed {
    fn parse(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let scale = fraction.len() as u32;
        let combined = format!("{whole}{fraction}");
        let units: i128 = if combined.is_empty() { 0 } else { combined.parse().ok()? };
        Some(Self {
            units: if negative { -units } else { units },
            scale,
        })
    }

    fn rescale(self, scale: u32) -> Option<Self> {
        if scale <= self.scale {
            return Some(self);
        }
        let factor = 10i128.checked_pow(scale - self.scale)?;
        Some(Self {
            units: self.units.checked_mul(factor)?,
            scale,
        })
    }

    /// Parses text that [`Fixed::render`] reproduces exactly
    fn parse_canonical(text: &str) -> Option<Self> {
        Self::parse(text).filter(|fixed| fixed.render() == text)
    }

    /// `hundredths` expressed at `scale`, at least one unit
    fn offset_at(hundredths: i128, scale: u32) -> Option<i128> {
        let units = if scale >= DECIMAL_PLACES {
            hundredths.checked_mul(10i128.checked_pow(scale - DECIMAL_PLACES)?)?
        } else {
            hundredths / 10i128.pow(DECIMAL_PLACES - scale)
        };
        Some(units.max(1))
    }

    fn shift(self, offset: i128, encrypt: bool) -> Option<Self> {
        let units = if encrypt {
            self.units.checked_add(offset)?
        } else {
            self.units.checked_sub(offset)?
        };
        Some(Self {
            units,
            scale: self.scale,
        })
    }

    fn same_value(self, other: Self) -> bool {
        let scale = self.scale.max(other.scale);
        match (self.rescale(scale), other.rescale(scale)) {
            (Some(a), Some(b)) => a.units == b.units,
            _ => false,
        }
    }

    fn render(&self) -> String {
        let sign = if self.units < 0 { "-" } else { "" };
        let digits = self.units.unsigned_abs().to_string();
        if self.scale == 0 {
            return format!("{sign}{digits}");
        }
        let scale = self.scale as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        format!("{sign}{whole}.{fraction}")
    }
}

/// Adds (or removes) `key % 10000` hundredths to a decimal
///
/// Numeric strings keep their exact text: the offset is taken at the string's
/// own scale (at least one unit). Integer numbers stay integers and move by
/// whole units. Floats stay floats and are shifted at two or more decimal
/// places; a shift `f64` cannot hold exactly is an error.
fn shift_decimal(value: &Value, key: u128, encrypt: bool) -> Result<Value> {
    let invalid = || CustodianError::Encryption(format!("{value} is not a decimal number"));
    let out_of_range =
        || CustodianError::Encryption(format!("Decimal {value} is out of range for anonymization"));
    let hundredths = (key % DECIMAL_RANGE) as i128;

    match value {
        Value::String(text) => {
            let parsed = Fixed::parse_canonical(text).ok_or_else(invalid)?;
            let offset = Fixed::offset_at(hundredths, parsed.scale).ok_or_else(out_of_range)?;
            let shifted = parsed.shift(offset, encrypt).ok_or_else(out_of_range)?;
            Ok(Value::String(shifted.render()))
        }
        Value::Number(n) if !n.is_f64() => {
            let offset = 1 + (hundredths / 100) as i64;
            shift_integer(&FieldTransform::Decimal, value, offset, encrypt)
        }
        Value::Number(n) => {
            let parsed = Fixed::parse_canonical(&n.to_string()).ok_or_else(invalid)?;
            let scale = parsed.scale.max(DECIMAL_PLACES);
            let offset = Fixed::offset_at(hundredths, scale).ok_or_else(out_of_range)?;
            let shifted = parsed
                .rescale(scale)
                .and_then(|fixed| fixed.shift(offset, encrypt))
                .ok_or_else(out_of_range)?;

            let float: f64 = shifted.render().parse().map_err(|_| invalid())?;
            let number = Number::from_f64(float).ok_or_else(out_of_range)?;
            let exact = Fixed::parse(&number.to_string()).map_or(false, |back| back.same_value(shifted));
            if !exact {
                return Err(CustodianError::Encryption(format!(
                    "Decimal {value} cannot be shifted without losing precision"
                )));
            }
            Ok(Value::Number(number))
        }
        _ => Err(invalid()),
    }
}

fn shift_date(value: &Value, key: u128, encrypt: bool) -> Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| CustodianError::Encryption(format!("{value} is not a date")))?;
    let out_of_range =
        || CustodianError::Encryption(format!("Date '{text}' is out of range for anonymization"));

    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        if date.format(DATE_FORMAT).to_string() != text {
            return Err(CustodianError::Encryption(format!(
                "Date '{text}' is not in YYYY-MM-DD form"
            )));
        }
        let days = Duration::days(1 + (key % DATE_RANGE_DAYS) as i64);
        let shifted = if encrypt {
            date.checked_sub_signed(days)
        } else {
            date.checked_add_signed(days)
        }
        .filter(|d| d.year() >= 0)
        .ok_or_else(out_of_range)?;
        return Ok(Value::String(shifted.format(DATE_FORMAT).to_string()));
    }

    let datetime = DateTime::parse_from_rfc3339(text).map_err(|e| {
        CustodianError::Encryption(format!("'{text}' is neither a date nor an RFC 3339 datetime: {e}"))
    })?;

    // Whole-second shifts leave the separator, fraction and offset text as written
    let (head, tail) = match (text.get(..DATETIME_HEAD_LEN), text.get(DATETIME_HEAD_LEN..)) {
        (Some(head), Some(tail)) => (head, tail),
        _ => return Err(out_of_range()),
    };
    let separator = head.get(10..11).ok_or_else(out_of_range)?;
    let fraction_len = tail
        .strip_prefix('.')
        .map_or(0, |rest| 1 + rest.chars().take_while(char::is_ascii_digit).count());
    let (fraction, offset) = tail.split_at(fraction_len);

    let seconds = Duration::seconds(1 + (key % DATETIME_RANGE_SECONDS) as i64);
    let shifted = if encrypt {
        datetime.checked_sub_signed(seconds)
    } else {
        datetime.checked_add_signed(seconds)
    }
    .filter(|d| d.year() >= 0)
    .ok_or_else(out_of_range)?;

    Ok(Value::String(format!(
        "{}{separator}{}{fraction}{offset}",
        shifted.format(DATE_FORMAT),
        shifted.format("%H:%M:%S")
    )))
}

fn shift_ip(value: &Value, key: &str, encrypt: bool) -> Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| CustodianError::Encryption(format!("{value} is not an IP address")))?;
    let address: IpAddr = text
        .trim()
        .parse()
        .map_err(|e| CustodianError::Encryption(format!("'{text}' is not an IP address: {e}")))?;
    let offsets = Sha256::digest(key.as_bytes());

    let shifted = match address {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            for (octet, offset) in octets.iter_mut().zip(offsets.iter()) {
                *octet = if encrypt {
                    octet.wrapping_add(*offset)
                } else {
                    octet.wrapping_sub(*offset)
                };
            }
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut segments = v6.segments();
            for (segment, pair) in segments.iter_mut().zip(offsets.chunks(2)) {
                let offset = u16::from_be_bytes([pair[0], pair[1]]);
                *segment = if encrypt {
                    segment.wrapping_add(offset)
                } else {
                    segment.wrapping_sub(offset)
                };
            }
            IpAddr::V6(Ipv6Addr::from(segments))
        }
    };
    Ok(Value::String(shifted.to_string()))
}

fn translate_json(value: &Value, context: &EncryptionContext, encrypt: bool) -> Result<Value> {
    let key = context.numeric_key();
    Ok(match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(if encrypt {
            encrypt_message(context.key(), s, LETTERS)
        } else {
            decrypt_message(context.key(), s, LETTERS)
        }),
        Value::Bool(b) => Value::Bool(if key % 2 == 0 { !b } else { *b }),
        Value::Number(n) if n.is_f64() => shift_decimal(value, key, encrypt)?,
        Value::Number(_) => {
            let offset = 1 + (key % INTEGER_RANGE) as i64;
            shift_integer(&FieldTransform::Json, value, offset, encrypt)?
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| translate_json(item, context, encrypt))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), translate_json(v, context, encrypt)?)))
                .collect::<Result<_>>()?,
        ),
    })
}
