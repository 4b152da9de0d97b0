// Shared diagnosis types, identifiers, and validators used by the API service and its client.
pub mod envelope;
pub mod ids;
pub mod model;
pub mod validation;

pub use envelope::{
    DiagnosisListResponse, DiagnosisResponse, ErrorResponse, HealthResponse, HealthServices,
    Pagination, ServiceHealthResponse,
};
pub use ids::{ClientId, DiagnosisId};
pub use model::{CreateDiagnosisRequest, Diagnosis, UpdateDiagnosisRequest, stored_precision};
pub use validation::{BodySchema, FieldError, Validate};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid client id: {0}")]
    InvalidClientId(String),
    #[error("invalid diagnosis id: {0}")]
    InvalidDiagnosisId(String),
}
