//! Data Transfer Objects (DTOs) for API requests and responses

pub mod client;
pub mod common;
pub mod tariff;
pub mod ticket;

pub use client::*;
pub use common::*;
pub use tariff::*;
pub use ticket::*;
