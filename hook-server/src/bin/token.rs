//! Hookcatch Token - mint a bearer token for a user.
//!
//! Usage: `hookcatch-token <user-id> [email]`
//!
//! Registers (or refreshes) the user so webhooks can reference it, then
//! prints a signed token valid for `TOKEN_TTL_SECS` to stdout. Logs go to
//! stderr.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookcatch::auth::issue_token;
use hookcatch::{Config, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let user_id = args
        .next()
        .filter(|id| !id.trim().is_empty())
        .context("usage: hookcatch-token <user-id> [email]")?;
    let email = args.next();

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = PgStore::connect(&config)
        .await
        .context("Failed to connect to database")?;
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    store
        .upsert_user(&user_id, email.as_deref())
        .await
        .context("Failed to save user")?;
    store.close().await;

    let ttl = Duration::from_secs(config.token_ttl_secs);
    let token = issue_token(&user_id, email.as_deref(), &config.jwt_secret, ttl)
        .context("Failed to sign token")?;

    info!(user_id = %user_id, ttl_secs = config.token_ttl_secs, "token_issued");
    println!("{}", token);

    Ok(())
}
