use crate::error::CoreError;
use bstr::ByteSlice;
use chrono::Offset;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::str::FromStr;

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub enum SignatureType {
    Author,
    Committer,
    Tagger,
}

impl SignatureType {
    pub fn from_data(data: &[u8]) -> Result<Self, CoreError> {
        let s = std::str::from_utf8(data)
            .map_err(|e| CoreError::ObjectBroken(e.to_string()))?;
        SignatureType::from_str(s)
    }

    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            SignatureType::Author => b"author",
            SignatureType::Committer => b"committer",
            SignatureType::Tagger => b"tagger",
        }
    }
}

impl Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SignatureType::Author => write!(f, "author"),
            SignatureType::Committer => write!(f, "committer"),
            SignatureType::Tagger => write!(f, "tagger"),
        }
    }
}

impl FromStr for SignatureType {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(SignatureType::Author),
            "committer" => Ok(SignatureType::Committer),
            "tagger" => Ok(SignatureType::Tagger),
            _ => Err(CoreError::ObjectBroken(format!("invalid signature type {s:?}"))),
        }
    }
}

/// Parses the 5-byte `±HHMM` timezone token into a signed second offset.
///
/// An absent sign means positive. Any other shape (wrong length, non-digit
/// characters) is rejected.
pub fn tz2delta(token: &str) -> Result<i32, CoreError> {
    let bad = || CoreError::ObjectBroken(format!("invalid timezone token {token:?}"));
    let (sign, digits) = match token.as_bytes().first() {
        Some(b'+') => (1, &token[1..]),
        Some(b'-') => (-1, &token[1..]),
        Some(c) if c.is_ascii_digit() => (1, token),
        _ => return Err(bad()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: i32 = digits[0..2].parse().map_err(|_| bad())?;
    let minutes: i32 = digits[2..4].parse().map_err(|_| bad())?;
    Ok(sign * (hours * 3600 + minutes * 60))
}

fn delta2tz(offset_seconds: i32) -> String {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let total_minutes = offset_seconds.abs() / 60;
    format!("{sign}{:02}{:02}", total_minutes / 60, total_minutes % 60)
}

#[derive(PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub signature_type: SignatureType,
    pub name: String,
    pub email: String,
    /// Raw unix-seconds value as written in the object, before timezone
    /// adjustment.
    pub timestamp: i64,
    /// Signed offset from UTC in seconds, parsed from the `±HHMM` token.
    pub tz_offset_seconds: i32,
}

impl Signature {
    /// `timestamp` shifted by `tz_offset_seconds`, per this codebase's time
    /// convention of normalizing to UTC-relative seconds.
    pub fn unix_seconds_utc_adjusted(&self) -> i64 {
        self.timestamp + self.tz_offset_seconds as i64
    }

    pub fn timezone_token(&self) -> String {
        delta2tz(self.tz_offset_seconds)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp,
            self.timezone_token()
        )
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Signature {
    /// Parses a single header-line payload of shape
    /// `<type> <name> <email in <>> <unix-seconds> <±HHMM>`, where `<type>`
    /// has already been stripped by the caller along with the leading
    /// space, i.e. `data` starts at the name.
    pub fn from_data(signature_type: SignatureType, data: &[u8]) -> Result<Signature, CoreError> {
        let bad = || CoreError::ObjectBroken("malformed signature line".to_string());

        let email_start = data.find_byte(b'<').ok_or_else(bad)?;
        let email_end = data.find_byte(b'>').ok_or_else(bad)?;
        if email_start == 0 || email_end < email_start {
            return Err(bad());
        }
        let name = data[..email_start - 1]
            .to_str()
            .map_err(|e| CoreError::ObjectBroken(e.to_string()))?
            .to_string();
        let email = data[email_start + 1..email_end]
            .to_str()
            .map_err(|e| CoreError::ObjectBroken(e.to_string()))?
            .to_string();

        let rest = &data[email_end + 2..];
        let sp = rest.find_byte(b' ').ok_or_else(bad)?;
        let timestamp: i64 = rest[..sp]
            .to_str()
            .map_err(|_| bad())?
            .parse()
            .map_err(|_| bad())?;
        let tz_token = rest[sp + 1..].to_str().map_err(|_| bad())?;
        let tz_offset_seconds = tz2delta(tz_token)?;

        Ok(Signature {
            signature_type,
            name,
            email,
            timestamp,
            tz_offset_seconds,
        })
    }

    pub fn to_data(&self) -> Vec<u8> {
        let mut sign = Vec::new();
        sign.extend_from_slice(self.signature_type.to_bytes());
        sign.push(b' ');
        sign.extend_from_slice(self.name.as_bytes());
        sign.push(b' ');
        sign.extend_from_slice(format!("<{}>", self.email).as_bytes());
        sign.push(b' ');
        sign.extend_from_slice(self.timestamp.to_string().as_bytes());
        sign.push(b' ');
        sign.extend_from_slice(self.timezone_token().as_bytes());
        sign
    }

    pub fn new(sign_type: SignatureType, author: String, email: String) -> Signature {
        let local_time = chrono::Local::now();
        let offset = local_time.offset().fix().local_minus_utc();
        Signature {
            signature_type: sign_type,
            name: author,
            email,
            timestamp: chrono::Utc::now().timestamp(),
            tz_offset_seconds: offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tz2delta_positive() {
        assert_eq!(tz2delta("+0200").unwrap(), 7200);
    }

    #[test]
    fn tz2delta_negative() {
        assert_eq!(tz2delta("-0530").unwrap(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn tz2delta_zero() {
        assert_eq!(tz2delta("+0000").unwrap(), 0);
    }

    #[test]
    fn tz2delta_maximal() {
        assert_eq!(tz2delta("+1400").unwrap(), 14 * 3600);
    }

    #[test]
    fn tz2delta_unsigned_defaults_positive() {
        assert_eq!(tz2delta("0130").unwrap(), 90 * 60);
    }

    #[test]
    fn tz2delta_rejects_bad_shape() {
        assert!(tz2delta("+013").is_err());
        assert!(tz2delta("+01a0").is_err());
        assert!(tz2delta("").is_err());
    }

    #[test]
    fn parses_author_line() {
        let data = b"Jane Doe <jane@example.com> 1700000000 +0200";
        let sig = Signature::from_data(SignatureType::Author, data).unwrap();
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.com");
        assert_eq!(sig.timestamp, 1700000000);
        assert_eq!(sig.tz_offset_seconds, 7200);
        assert_eq!(sig.unix_seconds_utc_adjusted(), 1700007200);
    }
}
