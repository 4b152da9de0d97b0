//! Declarative request validators shared by the API service and the client.
//!
//! # Purpose
//! Each request shape has one `Validate` implementation. The service runs it
//! at the HTTP boundary; the client runs it before sending, so both sides
//! reject the same payloads with the same `{field, message}` pairs.
//!
//! # Body pipeline
//! [`BodySchema::parse_body`] takes raw JSON and performs, in order:
//! sanitization, shape checks (object, string-typed fields), decoding, and
//! field validation.
use crate::ids::{ClientId, DiagnosisId};
use crate::model::{CreateDiagnosisRequest, UpdateDiagnosisRequest};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use utoipa::ToSchema;

pub const DIAGNOSIS_NAME_MAX_CHARS: usize = 500;
pub const JUSTIFICATION_MAX_CHARS: usize = 2000;
pub const CHALLENGED_DIAGNOSIS_MAX_CHARS: usize = 500;
pub const CHALLENGED_JUSTIFICATION_MAX_CHARS: usize = 2000;

/// One failed rule, keyed by the offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// A JSON request body with a fixed set of string fields.
pub trait BodySchema: Validate + DeserializeOwned + Sized {
    const REQUIRED_FIELDS: &'static [&'static str];
    const OPTIONAL_FIELDS: &'static [&'static str];

    fn parse_body(raw: Value) -> Result<Self, Vec<FieldError>> {
        let sanitized = sanitize_json(raw);
        check_string_fields(&sanitized, Self::REQUIRED_FIELDS, Self::OPTIONAL_FIELDS)?;
        let parsed: Self = serde_json::from_value(sanitized)
            .map_err(|err| vec![FieldError::new("body", err.to_string())])?;
        parsed.validate()?;
        Ok(parsed)
    }
}

pub fn validate_client_id(raw: &str) -> Result<ClientId, FieldError> {
    raw.parse()
        .map_err(|_| FieldError::new("clientId", "Invalid client ID format"))
}

pub fn validate_diagnosis_id(raw: &str) -> Result<DiagnosisId, FieldError> {
    raw.parse()
        .map_err(|_| FieldError::new("id", "Invalid diagnosis ID format"))
}

/// Raw `page`/`limit` query values for the history listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        let page = parse_integer(params.get("page"), "page", "Page must be an integer", &mut errors);
        let limit = parse_integer(
            params.get("limit"),
            "limit",
            "Limit must be an integer",
            &mut errors,
        );
        if errors.is_empty() {
            Ok(Self { page, limit })
        } else {
            Err(errors)
        }
    }
}

fn parse_integer(
    raw: Option<&String>,
    field: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<i64> {
    let raw = raw?.trim();
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(FieldError::new(field, message));
            None
        }
    }
}

impl Validate for CreateDiagnosisRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        required_text(
            &mut errors,
            "diagnosisName",
            &self.diagnosis_name,
            DIAGNOSIS_NAME_MAX_CHARS,
            "Diagnosis name is required",
            "Diagnosis name too long",
        );
        required_text(
            &mut errors,
            "justification",
            &self.justification,
            JUSTIFICATION_MAX_CHARS,
            "Justification is required",
            "Justification too long",
        );
        challenge_text(
            &mut errors,
            self.challenged_diagnosis.as_deref(),
            self.challenged_justification.as_deref(),
        );
        finish(errors)
    }
}

impl BodySchema for CreateDiagnosisRequest {
    const REQUIRED_FIELDS: &'static [&'static str] = &["diagnosisName", "justification"];
    const OPTIONAL_FIELDS: &'static [&'static str] =
        &["challengedDiagnosis", "challengedJustification"];
}

impl Validate for UpdateDiagnosisRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(name) = &self.diagnosis_name {
            required_text(
                &mut errors,
                "diagnosisName",
                name,
                DIAGNOSIS_NAME_MAX_CHARS,
                "Diagnosis name is required",
                "Diagnosis name too long",
            );
        }
        if let Some(justification) = &self.justification {
            required_text(
                &mut errors,
                "justification",
                justification,
                JUSTIFICATION_MAX_CHARS,
                "Justification is required",
                "Justification too long",
            );
        }
        challenge_text(
            &mut errors,
            self.challenged_diagnosis.as_deref(),
            self.challenged_justification.as_deref(),
        );
        finish(errors)
    }
}

impl BodySchema for UpdateDiagnosisRequest {
    const REQUIRED_FIELDS: &'static [&'static str] = &[];
    const OPTIONAL_FIELDS: &'static [&'static str] = &[
        "diagnosisName",
        "justification",
        "challengedDiagnosis",
        "challengedJustification",
    ];
}

fn required_text(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    max_chars: usize,
    missing: &str,
    too_long: &str,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, missing));
    } else if len > max_chars {
        errors.push(FieldError::new(field, too_long));
    }
}

fn challenge_text(
    errors: &mut Vec<FieldError>,
    diagnosis: Option<&str>,
    justification: Option<&str>,
) {
    if diagnosis.is_some_and(|text| text.chars().count() > CHALLENGED_DIAGNOSIS_MAX_CHARS) {
        errors.push(FieldError::new(
            "challengedDiagnosis",
            "Challenged diagnosis too long",
        ));
    }
    if justification.is_some_and(|text| text.chars().count() > CHALLENGED_JUSTIFICATION_MAX_CHARS)
    {
        errors.push(FieldError::new(
            "challengedJustification",
            "Challenged justification too long",
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Reject non-object bodies and declared fields holding non-string values.
/// Optional fields may be `null`; required ones may not.
pub fn check_string_fields(
    body: &Value,
    required: &[&str],
    optional: &[&str],
) -> Result<(), Vec<FieldError>> {
    let Some(object) = body.as_object() else {
        return Err(vec![FieldError::new("body", "Expected object")]);
    };
    let mut errors = Vec::new();
    let declared = required
        .iter()
        .map(|field| (*field, false))
        .chain(optional.iter().map(|field| (*field, true)));
    for (field, nullable) in declared {
        let Some(value) = object.get(field) else {
            continue;
        };
        if value.is_string() || (nullable && value.is_null()) {
            continue;
        }
        errors.push(FieldError::new(
            field,
            format!("Expected string, received {}", json_type_name(value)),
        ));
    }
    finish(errors)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct SanitizePatterns {
    script: Regex,
    javascript: Regex,
    handler: Regex,
    key: Regex,
}

static SANITIZE_PATTERNS: OnceLock<SanitizePatterns> = OnceLock::new();

fn sanitize_patterns() -> &'static SanitizePatterns {
    SANITIZE_PATTERNS.get_or_init(|| SanitizePatterns {
        script: Regex::new(r"(?is)<script\b.*?</script\s*>").expect("static script pattern"),
        javascript: Regex::new(r"(?i)javascript:").expect("static javascript pattern"),
        handler: Regex::new(r"(?i)\bon\w+\s*=").expect("static handler pattern"),
        key: Regex::new(r"[^\w\s\-.]").expect("static key pattern"),
    })
}

/// Strip script blocks, `javascript:` prefixes and inline event handlers, then trim.
pub fn sanitize_text(input: &str) -> String {
    let patterns = sanitize_patterns();
    let without_scripts = patterns.script.replace_all(input, "");
    let without_js = patterns.javascript.replace_all(&without_scripts, "");
    let without_handlers = patterns.handler.replace_all(&without_js, "");
    without_handlers.trim().to_string()
}

/// Apply [`sanitize_text`] to every string in `value`, and scrub object keys.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(sanitize_text(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(object) => {
            let key_pattern = &sanitize_patterns().key;
            let mut cleaned = Map::with_capacity(object.len());
            for (key, value) in object {
                let key = key_pattern.replace_all(&key, "").into_owned();
                cleaned.insert(key, sanitize_json(value));
            }
            Value::Object(cleaned)
        }
        other => other,
    }
}
