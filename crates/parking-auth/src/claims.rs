//! JWT Claims structure
//!
//! Defines the claims structure used in JWT tokens for authentication.

use crate::roles::Role;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (operator name)
    pub sub: String,

    /// Operator role
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims; expiration is filled in by `JwtService`
    ///
    /// # Examples
    ///
    /// ```
    /// use parking_auth::{Claims, Role};
    ///
    /// let claims = Claims::new("admin", Role::Admin);
    /// assert_eq!(claims.sub, "admin");
    /// assert_eq!(claims.role, Role::Admin);
    /// ```
    pub fn new(subject: &str, role: Role) -> Self {
        Self {
            sub: subject.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Create new claims with custom expiration duration
    pub fn with_expiration(subject: &str, role: Role, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}
