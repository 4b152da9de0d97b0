//! OpenAPI schema aggregation for the diagnosis API.
//!
//! # Purpose
//! Collects all routes and schema types into the document served at
//! `/openapi.json`.
use crate::api::diagnoses;
use crate::api::system::{self, ServiceDescriptor};
use diagnosis_common::{
    CreateDiagnosisRequest, Diagnosis, DiagnosisListResponse, DiagnosisResponse, ErrorResponse,
    FieldError, HealthResponse, HealthServices, Pagination, ServiceHealthResponse,
    UpdateDiagnosisRequest,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Diagnostic Support API",
        version = "1.0.0",
        description = "Records AI-suggested diagnoses per client and lets therapists challenge them"
    ),
    paths(
        system::root,
        system::health,
        diagnoses::get_latest,
        diagnoses::upsert_by_client,
        diagnoses::update_by_id,
        diagnoses::get_by_id,
        diagnoses::list_history,
        diagnoses::service_health
    ),
    components(schemas(
        Diagnosis,
        CreateDiagnosisRequest,
        UpdateDiagnosisRequest,
        DiagnosisResponse,
        DiagnosisListResponse,
        Pagination,
        ErrorResponse,
        FieldError,
        HealthResponse,
        HealthServices,
        ServiceHealthResponse,
        ServiceDescriptor
    )),
    tags(
        (name = "system", description = "Service descriptor and liveness"),
        (name = "diagnoses", description = "Diagnosis records and challenges")
    )
)]
pub struct ApiDoc;
