//! Session wiring (standalone + embeddable).
//!
//! - **Standalone**: `connect()` loads `.env` and config, installs tracing
//!   and builds an HTTP-backed session
//! - **Embedded**: a host supplies its own store, gateway and verifier to
//!   `DashboardSession::new`

mod state;

pub use state::{build_session, build_session_from_env, DashboardSession, HttpSession};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
/// A no-op when a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Standalone entrypoint for hosts that only want the default wiring.
pub fn connect() -> anyhow::Result<HttpSession> {
    init_tracing();
    let session = build_session_from_env().context("build session")?;
    info!("Dashboard session ready");
    Ok(session)
}
