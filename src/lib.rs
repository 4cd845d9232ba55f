//! Relay Deck
//!
//! Client core for a dashboard that manages automated-messaging accounts:
//! a stale-while-revalidate query cache over the managed backend, a command
//! dispatcher that invalidates instead of editing cached records, and token
//! verification against the messaging platform.
//!
//! ## Standalone
//!
//! ```rust,ignore
//! use relay_deck::session::connect;
//! use relay_deck::presentation::DashboardUiState;
//!
//! let session = connect()?;
//! session.refresh().await?;
//! let view = session.dashboard(&DashboardUiState::default(), chrono::Utc::now());
//! ```
//!
//! ## Embedded
//!
//! Hosts with their own transport implement `RecordStore`, `CommandGateway`
//! and `CredentialVerifier` and hand them to `DashboardSession::new`.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod session;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
pub use presentation::*;
pub use session::*;
