//! Guest identifier validation
//!
//! Format: `G` + 8 payload digits + 1 check digit (10 characters).
//! The check digit is the ones place of the payload digit sum.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Literal prefix of every guest identifier
pub const GUEST_ID_PREFIX: char = 'G';

/// Total identifier length in characters
pub const GUEST_ID_LEN: usize = 10;

/// Number of payload digits summed into the check digit
const PAYLOAD_DIGITS: usize = 8;

/// Reason a scanned string is not a guest identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuestIdError {
    #[error("expected 10 characters, got {0}")]
    Length(usize),
    #[error("identifier must start with 'G'")]
    Prefix,
    #[error("non-digit character at position {0}")]
    NonDigit(usize),
    #[error("check digit {actual} does not match payload sum digit {expected}")]
    Checksum { expected: u32, actual: u32 },
}

/// A validated guest identifier
///
/// Only obtainable through [`GuestId::parse`], so holding one proves the
/// checksum held at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestId(String);

impl GuestId {
    /// Validate a scanned string and wrap it unchanged
    pub fn parse(raw: &str) -> Result<Self, GuestIdError> {
        let chars: Vec<char> = raw.chars().collect();
        if chars.len() != GUEST_ID_LEN {
            return Err(GuestIdError::Length(chars.len()));
        }
        if chars[0] != GUEST_ID_PREFIX {
            return Err(GuestIdError::Prefix);
        }

        let mut digits = [0u32; GUEST_ID_LEN - 1];
        for (i, c) in chars[1..].iter().enumerate() {
            digits[i] = c.to_digit(10).ok_or(GuestIdError::NonDigit(i + 1))?;
        }

        let sum: u32 = digits[..PAYLOAD_DIGITS].iter().sum();
        let expected = sum % 10;
        let actual = digits[PAYLOAD_DIGITS];
        if expected != actual {
            return Err(GuestIdError::Checksum { expected, actual });
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form without the prefix: `G123456786` -> `123 456 786`
    pub fn display_groups(&self) -> String {
        // Validated identifiers are ASCII, so byte offsets are char offsets
        let s = &self.0;
        format!("{} {} {}", &s[1..4], &s[4..7], &s[7..10])
    }

    /// Payload to re-encode as the guest's pass
    pub fn qr_payload(&self) -> QrPayload {
        QrPayload { data: self.0.clone(), ec_level: EcLevel::High }
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for GuestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Returns true if `raw` is a well-formed guest identifier
pub fn validate(raw: &str) -> bool {
    GuestId::parse(raw).is_ok()
}

/// QR error-correction level; passes are always encoded at High (~30%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EcLevel {
    High,
}

impl EcLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EcLevel::High => "H",
        }
    }
}

/// What the display re-encodes for the guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrPayload {
    pub data: String,
    pub ec_level: EcLevel,
}
