//! Phone number validation and E.164 canonicalization.
//!
//! Input first passes a digits-only gate (after folding Persian and
//! Arabic-Indic digits). Parsing and validation against the numbering plan
//! are then done by `phonenumber`, the Rust port of libphonenumber.

use std::fmt;
use std::str::FromStr;

use phonenumber::{Mode, PhoneNumber, country};

use crate::error::PhoneError;

/// A region (ISO 3166-1 alpha-2) whose numbering plan is used for numbers
/// written without a country code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    id: country::Id,
}

impl Region {
    /// Iran, the default region for the onboarding flow.
    pub const IR: Region = Region {
        id: country::Id::IR,
    };

    pub fn code(&self) -> &str {
        self.id.as_ref()
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::IR
    }
}

impl FromStr for Region {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .to_ascii_uppercase()
            .parse::<country::Id>()
            .map(|id| Region { id })
            .map_err(|_| PhoneError::UnknownRegion(s.to_string()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A phone number in E.164 form, e.g. `+989121234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPhone {
    country_code: u16,
    e164: String,
}

impl CanonicalPhone {
    fn from_number(number: &PhoneNumber) -> Self {
        Self {
            country_code: number.code().value(),
            e164: number.format().mode(Mode::E164).to_string(),
        }
    }

    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    pub fn as_str(&self) -> &str {
        &self.e164
    }

    pub fn into_string(self) -> String {
        self.e164
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.e164)
    }
}

/// Validate free text as a phone number and reformat it to E.164.
pub fn normalize(raw: &str, default_region: Region) -> Result<CanonicalPhone, PhoneError> {
    let folded = fold_digits(raw);
    let (has_plus, digits) = match folded.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, folded.as_str()),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PhoneError::NotDigits);
    }

    if has_plus {
        return parse_valid(None, &folded);
    }

    let national = parse_valid(Some(default_region.id), digits);
    if national.is_ok() {
        return national;
    }

    // Numbers typed in international form without the '+', either bare or
    // behind a dialling prefix. The first reading's error is the one reported.
    let international = ["00", "011"]
        .iter()
        .filter_map(|idd| digits.strip_prefix(*idd))
        .chain(std::iter::once(digits))
        .filter(|rest| !rest.is_empty())
        .find_map(|rest| parse_valid(None, &format!("+{rest}")).ok());

    match international {
        Some(phone) => Ok(phone),
        None => national,
    }
}

/// Map Persian (U+06F0..) and Arabic-Indic (U+0660..) digits to ASCII.
fn fold_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            _ => c,
        })
        .collect()
}

fn parse_valid(region: Option<country::Id>, text: &str) -> Result<CanonicalPhone, PhoneError> {
    let number = phonenumber::parse(region, text).map_err(|e| match e {
        phonenumber::ParseError::InvalidCountryCode => PhoneError::UnknownCountryCode,
        other => PhoneError::Malformed(other.to_string()),
    })?;
    if !phonenumber::is_valid(&number) {
        return Err(PhoneError::NotValid {
            country_code: number.code().value(),
        });
    }
    Ok(CanonicalPhone::from_number(&number))
}
