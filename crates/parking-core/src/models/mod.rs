//! Domain models for the parking engine
//!
//! This module contains all the core domain models used throughout the application.

pub mod client;
pub mod payment;
pub mod place;
pub mod statistics;
pub mod subscription;
pub mod tariff;
pub mod ticket;

pub use client::{Client, ClientIdentity, MobilityFlag};
pub use payment::{NewPayment, Payment, PaymentFilter, PaymentMode, PaymentRecord};
pub use place::{Occupancy, Place, PlaceType};
pub use statistics::ParkingStatistics;
pub use subscription::{SubscribeOutcome, Subscription, SubscriptionRecord};
pub use tariff::{ClientClass, Tariff, TariffSchedule};
pub use ticket::{ClosedTicket, Ticket, TicketFilter, TicketRecord, TicketStatus};
