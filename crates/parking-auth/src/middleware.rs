//! Actix-web request extractor for authenticated operators

use crate::jwt::JwtService;
use crate::roles::{Capability, Role};
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use parking_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Authenticated operator
///
/// Extracts and validates the JWT of the request. Handlers then check the
/// capability they need with [`AuthenticatedUser::require`].
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use parking_auth::{AuthenticatedUser, Capability};
/// use parking_core::AppError;
///
/// async fn protected_handler(user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
///     user.require(Capability::ViewRecords)?;
///     Ok(HttpResponse::Ok().body(user.username))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,

    pub role: Role,

    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Fail with `Forbidden` unless the role grants `capability`
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.grants(capability) {
            return Ok(());
        }

        warn!(
            username = %self.username,
            role = %self.role,
            capability = %capability,
            "Operator lacks capability"
        );
        Err(AppError::Forbidden)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let jwt_service = match req.app_data::<web::Data<Arc<JwtService>>>() {
            Some(service) => service.get_ref().clone(),
            None => {
                warn!("JwtService not found in app data");
                return ready(Err(AppError::Internal(
                    "Authentication service not configured".to_string(),
                )
                .into()));
            }
        };

        let token = match extract_bearer_token(req) {
            Some(t) => t,
            None => {
                debug!("No authentication token found in request");
                return ready(Err(AppError::Unauthorized(
                    "No authentication token provided".to_string(),
                )
                .into()));
            }
        };

        match jwt_service.validate_token(&token) {
            Ok(claims) => {
                debug!(username = %claims.sub, role = %claims.role, "Operator authenticated");

                ready(Ok(AuthenticatedUser {
                    username: claims.sub.clone(),
                    role: claims.role,
                    claims,
                }))
            }
            Err(e) => ready(Err(e.into())),
        }
    }
}
