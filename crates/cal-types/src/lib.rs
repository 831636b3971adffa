pub mod config;
pub mod errors;
pub mod format;

pub use config::*;
pub use errors::*;
pub use format::*;
