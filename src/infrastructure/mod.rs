pub mod backend;
pub mod config;
pub mod fingerprint;
pub mod platform;

pub use backend::*;
pub use config::*;
pub use fingerprint::*;
pub use platform::*;
