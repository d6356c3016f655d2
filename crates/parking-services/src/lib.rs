//! Occupancy & Billing Engine
//!
//! This crate hosts the parking logic: place allocation under capacity
//! constraints, the open → closed ticket lifecycle, tariff and subscription
//! aware fare computation, and statistics over the live state.
//!
//! # Architecture
//!
//! The components operate on a storage transaction handed in by the caller
//! ([`parking_core::traits::ParkingTx`]) and never open one themselves. The
//! [`ParkingEngine`] facade opens one transaction per operation, composes
//! the components inside it and commits, so every operation is
//! all-or-nothing.
//!
//! - `PlacePool` - allocation and release of places
//! - `SubscriptionRegistry` - subscriber status
//! - `TariffRegistry` - versioned hourly rates
//! - `TicketManager` - ticket state machine (entry, exit)
//! - `BillingPolicy` - pure fare computation
//! - `StatisticsAggregator` - read-only metrics
//! - `ClientRegistry` - client records keyed by phone

pub mod billing;
pub mod client_registry;
pub mod clock;
pub mod engine;
pub mod place_pool;
pub mod statistics;
pub mod subscription_registry;
pub mod tariff_registry;
pub mod ticket_manager;

pub use billing::BillingPolicy;
pub use client_registry::ClientRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSettings, ParkingEngine};
pub use place_pool::{Eligibility, PlacePool};
pub use statistics::StatisticsAggregator;
pub use subscription_registry::SubscriptionRegistry;
pub use tariff_registry::TariffRegistry;
pub use ticket_manager::TicketManager;
