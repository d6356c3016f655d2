//! Client model
//!
//! A client is identified by phone number. Clients are created on first entry
//! or by explicit registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Mobility flag of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MobilityFlag {
    /// No special needs
    #[default]
    Standard,
    /// Reduced mobility
    Pmr,
}

impl fmt::Display for MobilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MobilityFlag::Standard => write!(f, "standard"),
            MobilityFlag::Pmr => write!(f, "pmr"),
        }
    }
}

impl MobilityFlag {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(MobilityFlag::Standard),
            "pmr" => Some(MobilityFlag::Pmr),
            _ => None,
        }
    }

    /// Build from a boolean "reduced mobility" marker
    pub fn from_pmr(pmr: bool) -> Self {
        if pmr {
            MobilityFlag::Pmr
        } else {
            MobilityFlag::Standard
        }
    }
}

/// Identity fields supplied by the caller at registration or entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub surname: String,
    pub given_name: String,
    pub phone: String,
}

impl ClientIdentity {
    pub fn new(
        surname: impl Into<String>,
        given_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            surname: surname.into(),
            given_name: given_name.into(),
            phone: phone.into(),
        }
    }

    /// Trim every field and reject empty ones
    pub fn normalized(&self) -> Result<Self, AppError> {
        let surname = self.surname.trim();
        let given_name = self.given_name.trim();
        let phone = self.phone.trim();

        if surname.is_empty() {
            return Err(AppError::InvalidInput("surname is required".to_string()));
        }
        if given_name.is_empty() {
            return Err(AppError::InvalidInput("given name is required".to_string()));
        }
        if phone.is_empty() {
            return Err(AppError::InvalidInput("phone is required".to_string()));
        }

        Ok(Self::new(surname, given_name, phone))
    }
}

/// Client entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier
    pub id: i64,

    /// Family name
    pub surname: String,

    /// First name
    pub given_name: String,

    /// Phone number, unique across clients
    pub phone: String,

    /// Mobility flag
    pub mobility: MobilityFlag,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// "Given Surname" for display
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
    }

    /// Identity fields of this client
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity::new(&self.surname, &self.given_name, &self.phone)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: 0,
            surname: String::new(),
            given_name: String::new(),
            phone: String::new(),
            mobility: MobilityFlag::Standard,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobility_parse() {
        assert_eq!(MobilityFlag::from_str("PMR"), Some(MobilityFlag::Pmr));
        assert_eq!(MobilityFlag::from_str(" standard "), Some(MobilityFlag::Standard));
        assert_eq!(MobilityFlag::from_str("wheelchair"), None);
        assert_eq!(MobilityFlag::from_pmr(true), MobilityFlag::Pmr);
    }

    #[test]
    fn test_identity_normalized() {
        let identity = ClientIdentity::new("  Martin ", "Lea", " 0612345678 ");
        let normalized = identity.normalized().unwrap();
        assert_eq!(normalized.surname, "Martin");
        assert_eq!(normalized.phone, "0612345678");
    }

    #[test]
    fn test_identity_rejects_blank_fields() {
        let identity = ClientIdentity::new("Martin", "   ", "0612345678");
        assert!(matches!(
            identity.normalized(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_full_name() {
        let client = Client {
            surname: "Martin".to_string(),
            given_name: "Lea".to_string(),
            ..Default::default()
        };
        assert_eq!(client.full_name(), "Lea Martin");
    }
}
