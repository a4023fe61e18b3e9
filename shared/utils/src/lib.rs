pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod validation;

pub use config::*;
pub use error::*;
pub use import::*;
pub use logging::*;
pub use validation::*;
