pub mod config;
pub mod error;
pub mod fact;
pub mod user;

pub use config::Config;
pub use error::*;
pub use fact::*;
pub use user::*;
