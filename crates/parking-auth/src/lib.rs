//! Authentication and authorization for the parking engine
//!
//! This crate provides JWT-based authentication and the capability model
//! that gates every engine operation exposed over HTTP.
//!
//! # Features
//!
//! - JWT token creation and validation
//! - Roles (`admin`, `agent`) mapped to capabilities
//! - Request extractor for authenticated operators
//!
//! # Examples
//!
//! ## Creating a JWT token
//!
//! ```no_run
//! use parking_auth::{Claims, JwtService, Role};
//!
//! let jwt_service = JwtService::new("your-secret-key", 3600);
//! let claims = Claims::new("gate-1", Role::Agent);
//! let token = jwt_service.create_token(&claims)?;
//! # Ok::<(), parking_core::AppError>(())
//! ```
//!
//! ## Checking a capability in a handler
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use parking_auth::{AuthenticatedUser, Capability};
//! use parking_core::AppError;
//!
//! async fn update_tariffs(user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
//!     user.require(Capability::ManageTariffs)?;
//!     Ok(HttpResponse::Ok().finish())
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod roles;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::AuthenticatedUser;
pub use roles::{Capability, Role};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_carries_capabilities() {
        let jwt_service = JwtService::new("test-secret-key-12345", 3600);

        let token = jwt_service.create_token_for_user("gate-1", Role::Agent).unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "gate-1");
        assert!(claims.role.grants(Capability::OperateGate));
        assert!(!claims.role.grants(Capability::ManageTariffs));
    }
}
