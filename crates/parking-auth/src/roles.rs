//! Operator roles and the capabilities they grant

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Gate and desk staff
    #[default]
    Agent,
    /// Car park manager
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agent" => Some(Role::Agent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Whether this role may perform operations requiring `capability`
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::Agent => !matches!(capability, Capability::ManageTariffs),
        }
    }
}

/// Permission checked before an engine operation is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Replace the hourly rates
    ManageTariffs,
    /// Register, edit, delete and subscribe clients
    ManageClients,
    /// Record entries and exits
    OperateGate,
    /// Read places, tickets, payments and statistics
    ViewRecords,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ManageTariffs => write!(f, "manage_tariffs"),
            Capability::ManageClients => write!(f, "manage_clients"),
            Capability::OperateGate => write!(f, "operate_gate"),
            Capability::ViewRecords => write!(f, "view_records"),
        }
    }
}
