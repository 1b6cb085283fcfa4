use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;
use crate::trace_ctx;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub trace_id: String,
}

/// Errors surfaced by the request helpers, the environment lookup and the
/// request-scoped database guard.
///
/// Rollback and close failures during guard teardown never become a
/// `WebError`; they are logged and swallowed in [`crate::db::guard`].
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Could not acquire a database connection: {detail}")]
    ConnectionAcquisition { detail: String },
    #[error("Could not read environment value '{name}'")]
    Configuration { name: String },
    #[error("Request Content-Type must be application/json, received: {received}")]
    ContentType { received: String },
    #[error("Bad request: {detail}")]
    BadRequest { detail: String },
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Template error: {detail}")]
    Template { detail: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl WebError {
    fn code(&self) -> &'static str {
        match self {
            WebError::ConnectionAcquisition { .. } => "DB_UNAVAILABLE",
            WebError::Configuration { .. } => "CONFIG_ERROR",
            WebError::ContentType { .. } => "UNSUPPORTED_CONTENT_TYPE",
            WebError::BadRequest { .. } => "BAD_REQUEST",
            WebError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            WebError::Template { .. } => "TEMPLATE_ERROR",
            WebError::Io(_) => "IO_ERROR",
            WebError::Db(_) => "DB_ERROR",
            WebError::Internal { .. } => "INTERNAL",
        }
    }

    /// Client-facing detail. Server-side failures do not leak their cause.
    fn detail(&self) -> String {
        match self {
            WebError::ConnectionAcquisition { .. } => "Database unavailable".to_string(),
            WebError::Configuration { name } => {
                format!("Environment value '{name}' is not configured")
            }
            WebError::ContentType { .. }
            | WebError::BadRequest { .. }
            | WebError::PayloadTooLarge { .. } => self.to_string(),
            WebError::Template { .. } => "Could not render view".to_string(),
            WebError::Io(_) => "I/O failure".to_string(),
            WebError::Db(_) => "Database failure".to_string(),
            WebError::Internal { .. } => "Internal server error".to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::ConnectionAcquisition { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WebError::ContentType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WebError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            WebError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::Configuration { .. }
            | WebError::Template { .. }
            | WebError::Io(_)
            | WebError::Db(_)
            | WebError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn connection_acquisition(detail: impl Into<String>) -> Self {
        Self::ConnectionAcquisition {
            detail: detail.into(),
        }
    }

    pub fn configuration(name: impl Into<String>) -> Self {
        Self::Configuration { name: name.into() }
    }

    /// `received` is the raw Content-Type header, if any.
    pub fn content_type(received: Option<&str>) -> Self {
        Self::ContentType {
            received: received.unwrap_or("(none)").to_string(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest {
            detail: detail.into(),
        }
    }

    pub fn template(detail: impl Into<String>) -> Self {
        Self::Template {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    fn humanize_code(code: &str) -> String {
        code.split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<sea_orm::DbErr> for WebError {
    fn from(e: sea_orm::DbErr) -> Self {
        WebError::Db(DbError::from(e))
    }
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code();
        let trace_id = trace_ctx::request_id();

        let problem_details = ProblemDetails {
            type_: format!("urn:request-kit:error:{}", code.to_lowercase()),
            title: Self::humanize_code(code),
            status: status.as_u16(),
            detail: self.detail(),
            code: code.to_string(),
            trace_id: trace_id.clone(),
        };

        HttpResponse::build(status)
            .content_type("application/problem+json")
            .insert_header(("x-request-id", trace_id))
            .json(problem_details)
    }
}
