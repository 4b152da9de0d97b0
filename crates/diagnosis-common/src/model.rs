//! Diagnosis record and request payloads.
//!
//! # Purpose
//! Defines the single persisted entity and the create/update payloads shared
//! by the HTTP service, its storage backends, and the data client.
use crate::ids::{ClientId, DiagnosisId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An AI-suggested diagnosis plus an optional therapist challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    #[schema(value_type = String, example = "clp123abc456def789")]
    pub id: DiagnosisId,
    #[schema(value_type = String, format = Uuid, example = "550e8400-e29b-41d4-a716-446655440001")]
    pub client_id: ClientId,
    pub diagnosis_name: String,
    pub predicted_date: DateTime<Utc>,
    pub justification: String,
    pub challenged_diagnosis: Option<String>,
    pub challenged_justification: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Diagnosis {
    /// Build a new record for `client_id`; `predicted_date` is fixed to `now`.
    pub fn new(client_id: ClientId, request: CreateDiagnosisRequest, now: DateTime<Utc>) -> Self {
        let now = stored_precision(now);
        Self {
            id: DiagnosisId::generate(),
            client_id,
            diagnosis_name: request.diagnosis_name,
            predicted_date: now,
            justification: request.justification,
            challenged_diagnosis: non_empty(request.challenged_diagnosis),
            challenged_justification: non_empty(request.challenged_justification),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the present fields of `patch`. An empty challenge string clears it.
    pub fn apply_update(&mut self, patch: &UpdateDiagnosisRequest, now: DateTime<Utc>) {
        if let Some(name) = &patch.diagnosis_name {
            self.diagnosis_name = name.clone();
        }
        if let Some(justification) = &patch.justification {
            self.justification = justification.clone();
        }
        if let Some(challenged) = &patch.challenged_diagnosis {
            self.challenged_diagnosis = non_empty(Some(challenged.clone()));
        }
        if let Some(challenged) = &patch.challenged_justification {
            self.challenged_justification = non_empty(Some(challenged.clone()));
        }
        self.updated_at = stored_precision(now);
    }
}

/// Timestamps are kept at microsecond precision, the finest `TIMESTAMPTZ`
/// holds, so a record returned from a write equals the one read back.
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiagnosisRequest {
    // Missing required fields decode as empty so validation reports them as
    // "required" rather than as a decode failure.
    #[serde(default)]
    #[schema(example = "Major Depressive Disorder")]
    pub diagnosis_name: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenged_diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenged_justification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDiagnosisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenged_diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenged_justification: Option<String>,
}

impl UpdateDiagnosisRequest {
    pub fn is_empty(&self) -> bool {
        self.diagnosis_name.is_none()
            && self.justification.is_none()
            && self.challenged_diagnosis.is_none()
            && self.challenged_justification.is_none()
    }
}

impl From<CreateDiagnosisRequest> for UpdateDiagnosisRequest {
    fn from(value: CreateDiagnosisRequest) -> Self {
        Self {
            diagnosis_name: Some(value.diagnosis_name),
            justification: Some(value.justification),
            challenged_diagnosis: value.challenged_diagnosis,
            challenged_justification: value.challenged_justification,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
