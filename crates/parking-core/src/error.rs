//! Unified error handling for the parking engine
//!
//! Every failure the engine can report is a variant of [`AppError`]. Each
//! variant belongs to exactly one [`ErrorKind`], which is the stable
//! classification callers use to render consistent messages.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Stable classification of engine failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced entity is absent
    NotFound,
    /// Duplicate phone, already parked, already closed
    Conflict,
    /// No free place of the requested type
    Capacity,
    /// Malformed input, non-positive rate, exit before entry
    BadInput,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but lacking the capability
    Forbidden,
    /// Infrastructure failure or upstream bug
    ServerError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Capacity => write!(f, "capacity"),
            ErrorKind::BadInput => write!(f, "bad_input"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::Forbidden => write!(f, "forbidden"),
            ErrorKind::ServerError => write!(f, "server_error"),
        }
    }
}

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Storage Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Concurrent writers collided (serialization failure, deadlock).
    /// Allocation retries on this variant.
    #[error("Concurrent update conflict: {0}")]
    Contention(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    // ==================== Lookup Errors ====================
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("No active tariff for class: {0}")]
    TariffNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== Conflict Errors ====================
    #[error("Phone number already in use: {0}")]
    DuplicatePhone(String),

    #[error("Client {client_id} already has open ticket {ticket_id}")]
    AlreadyParked { client_id: i64, ticket_id: i64 },

    #[error("Ticket already closed: {0}")]
    AlreadyClosed(i64),

    #[error("Client {0} has an open ticket")]
    ClientHasOpenTicket(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Capacity Errors ====================
    #[error("No available place of type {0}")]
    NoAvailability(String),

    // ==================== Validation Errors ====================
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Invalid interval: exit {exit} is before entry {entry}")]
    InvalidInterval { entry: String, exit: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Internal Errors ====================
    /// Release of a place that was already free
    #[error("Place {0} is not occupied")]
    PlaceNotOccupied(i64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ClientNotFound(_)
            | AppError::PlaceNotFound(_)
            | AppError::TicketNotFound(_)
            | AppError::TariffNotFound(_)
            | AppError::NotFound(_) => ErrorKind::NotFound,

            AppError::DuplicatePhone(_)
            | AppError::AlreadyParked { .. }
            | AppError::AlreadyClosed(_)
            | AppError::ClientHasOpenTicket(_)
            | AppError::Conflict(_) => ErrorKind::Conflict,

            AppError::NoAvailability(_) => ErrorKind::Capacity,

            AppError::InvalidRate(_)
            | AppError::InvalidInterval { .. }
            | AppError::Validation(_)
            | AppError::InvalidInput(_) => ErrorKind::BadInput,

            AppError::TokenExpired | AppError::InvalidToken(_) | AppError::Unauthorized(_) => {
                ErrorKind::Unauthorized
            }

            AppError::Forbidden => ErrorKind::Forbidden,

            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Transaction(_)
            | AppError::Contention(_)
            | AppError::PlaceNotOccupied(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Serialization(_) => ErrorKind::ServerError,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Capacity => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Contention(_) => "contention",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::ClientNotFound(_) => "client_not_found",
            AppError::PlaceNotFound(_) => "place_not_found",
            AppError::TicketNotFound(_) => "ticket_not_found",
            AppError::TariffNotFound(_) => "tariff_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicatePhone(_) => "duplicate_phone",
            AppError::AlreadyParked { .. } => "already_parked",
            AppError::AlreadyClosed(_) => "already_closed",
            AppError::ClientHasOpenTicket(_) => "client_has_open_ticket",
            AppError::Conflict(_) => "conflict",
            AppError::NoAvailability(_) => "no_availability",
            AppError::InvalidRate(_) => "invalid_rate",
            AppError::InvalidInterval { .. } => "invalid_interval",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::PlaceNotOccupied(_) => "place_not_occupied",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the failure came from colliding writers and may succeed on retry
    pub fn is_contention(&self) -> bool {
        matches!(self, AppError::Contention(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "kind": self.kind(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
