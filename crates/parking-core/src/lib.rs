//! Parking engine core library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the parking engine. It includes:
//!
//! - Domain models (Client, Place, Tariff, Ticket, Payment, ...)
//! - The transactional storage abstraction used by the engine
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::{AppError, ErrorKind};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
