//! Mint an admin JWT for the back-office routes.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p printshop-api --bin admin-token -- ops@example.com
//! ```
//!
//! Signs with `JWT_SECRET` and expires after `JWT_EXPIRY_HOURS`. The token is
//! printed to stdout.

use anyhow::Context;

use printshop_api::middleware::auth::{ADMIN_ROLE, encode_jwt};
use printshop_common::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let email = std::env::args()
        .nth(1)
        .context("usage: admin-token <staff-email>")?;

    let config = AppConfig::from_env()?;
    let token = encode_jwt(&email, ADMIN_ROLE, &config.jwt_secret, config.jwt_expiry_hours)?;

    eprintln!(
        "Admin token for {} (valid {}h):",
        email, config.jwt_expiry_hours
    );
    println!("{}", token);
    Ok(())
}
