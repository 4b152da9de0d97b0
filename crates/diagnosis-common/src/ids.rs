//! Strongly typed identifiers for clients and diagnosis records.
//!
//! Client identifiers are hyphenated UUIDs supplied by callers. Diagnosis
//! identifiers are collision-resistant, CUID-shaped strings generated by the
//! service: a leading `c`, a base36 millisecond timestamp, a process-local
//! counter, a process fingerprint, and a random block.
use crate::{Error, Result};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

const HYPHENATED_UUID_LEN: usize = 36;
const BASE36_BLOCK: u64 = 36 * 36 * 36 * 36;

static CUID_PATTERN: OnceLock<Regex> = OnceLock::new();
static CUID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn cuid_pattern() -> &'static Regex {
    CUID_PATTERN.get_or_init(|| Regex::new(r"(?i)^c[^\s-]{8,}$").expect("static cuid pattern"))
}

/// Identifier grouping the diagnoses that belong to one client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        // Only the canonical hyphenated form is accepted; braced, URN and
        // simple forms are rejected even though `Uuid` could parse them.
        if input.len() != HYPHENATED_UUID_LEN {
            return Err(Error::InvalidClientId(input.into()));
        }
        let uuid = Uuid::try_parse(input).map_err(|_| Error::InvalidClientId(input.into()))?;
        Ok(Self(uuid))
    }
}

impl TryFrom<String> for ClientId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClientId> for String {
    fn from(value: ClientId) -> Self {
        value.to_string()
    }
}

/// Identifier of a single diagnosis record.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiagnosisId(String);

impl DiagnosisId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let count = CUID_COUNTER.fetch_add(1, Ordering::Relaxed) % BASE36_BLOCK;
        let fingerprint = u64::from(std::process::id()) % BASE36_BLOCK;
        let random = rand::thread_rng().gen_range(0..BASE36_BLOCK * BASE36_BLOCK);
        Self(format!(
            "c{}{}{}{}",
            to_base36(millis),
            pad_base36(count, 4),
            pad_base36(fingerprint, 4),
            pad_base36(random, 8)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagnosisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DiagnosisId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        if !cuid_pattern().is_match(input) {
            return Err(Error::InvalidDiagnosisId(input.into()));
        }
        Ok(Self(input.to_string()))
    }
}

impl TryFrom<String> for DiagnosisId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if !cuid_pattern().is_match(&value) {
            return Err(Error::InvalidDiagnosisId(value));
        }
        Ok(Self(value))
    }
}

impl From<DiagnosisId> for String {
    fn from(value: DiagnosisId) -> Self {
        value.0
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn pad_base36(value: u64, width: usize) -> String {
    format!("{:0>width$}", to_base36(value), width = width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn client_id_requires_hyphenated_form() {
        assert!(ClientId::from_str("550e8400-e29b-41d4-a716-446655440001").is_ok());
        assert!(ClientId::from_str("550e8400e29b41d4a716446655440001").is_err());
        assert!(ClientId::from_str("{550e8400-e29b-41d4-a716-446655440001}").is_err());
        assert!(ClientId::from_str("550e8400-e29b-41d4-a716-44665544000g").is_err());
    }

    #[test]
    fn client_id_serializes_as_lowercase_string() {
        let id = ClientId::from_str("550E8400-E29B-41D4-A716-446655440001").expect("parse");
        let json = serde_json::to_value(id).expect("json");
        assert_eq!(json, "550e8400-e29b-41d4-a716-446655440001");
        let back: ClientId = serde_json::from_value(json).expect("decode");
        assert_eq!(back, id);
    }

    #[test]
    fn generated_ids_match_cuid_shape_and_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = DiagnosisId::generate();
            assert!(id.as_str().starts_with('c'));
            assert_eq!(id.as_str().len(), 25);
            assert!(DiagnosisId::from_str(id.as_str()).is_ok());
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn diagnosis_id_accepts_seed_style_ids() {
        assert!(DiagnosisId::from_str("clp123abc456def789").is_ok());
        assert!(DiagnosisId::from_str("CLP123ABC456").is_ok());
        assert!(DiagnosisId::from_str("c1234567").is_err());
        assert!(DiagnosisId::from_str("clp123-abc456def").is_err());
        assert!(DiagnosisId::from_str("550e8400-e29b-41d4-a716-446655440001").is_err());
    }

    #[test]
    fn diagnosis_id_deserialize_validates() {
        let err = serde_json::from_value::<DiagnosisId>(serde_json::json!("bogus"));
        assert!(err.is_err());
    }

    #[test]
    fn base36_padding() {
        assert_eq!(pad_base36(0, 4), "0000");
        assert_eq!(pad_base36(35, 4), "000z");
        assert_eq!(to_base36(36), "10");
    }
}
