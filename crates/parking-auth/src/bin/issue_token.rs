//! Mint an operator token
//!
//! Usage: issue-token <subject> <admin|agent> [minutes]
//!
//! The signing secret comes from the regular configuration
//! (`config/default.toml` or `PARKING__AUTH__JWT_SECRET`).

use parking_auth::{Claims, JwtService, Role};
use parking_core::{AppConfig, AppError};

fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let subject = args
        .next()
        .ok_or_else(|| AppError::InvalidInput("usage: issue-token <subject> <role> [minutes]".into()))?;
    let role_arg = args.next().unwrap_or_else(|| "agent".to_string());
    let role = Role::from_str(&role_arg)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown role: {}", role_arg)))?;

    let config = AppConfig::load()?;
    let minutes = match args.next() {
        Some(m) => m
            .parse::<i64>()
            .map_err(|e| AppError::InvalidInput(format!("invalid minutes {}: {}", m, e)))?,
        None => config.auth.jwt_expiration_minutes,
    };

    let jwt = JwtService::from_config(&config.auth);
    let token = jwt.create_token(&Claims::with_expiration(&subject, role, minutes * 60))?;

    println!("{}", token);
    Ok(())
}
