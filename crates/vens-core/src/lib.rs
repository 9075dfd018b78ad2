pub mod config;
pub mod error;
pub mod types;

pub use config::VensConfig;
pub use error::{Result, VensError};
pub use types::*;
