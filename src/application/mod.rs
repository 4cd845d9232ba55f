pub mod account_form;
pub mod cache;
pub mod dispatcher;
pub mod verification;

pub use account_form::*;
pub use cache::*;
pub use dispatcher::*;
pub use verification::*;
