//! View models built from cache snapshots. Pure: no I/O.

pub mod account_card;
pub mod dashboard;
pub mod format;
pub mod notice;

pub use account_card::*;
pub use dashboard::*;
pub use format::*;
pub use notice::*;
