pub mod access;
pub mod account;
pub mod activity;
pub mod draft;
pub mod identity;
pub mod stats;

pub use access::*;
pub use account::*;
pub use activity::*;
pub use draft::*;
pub use identity::*;
pub use stats::*;
