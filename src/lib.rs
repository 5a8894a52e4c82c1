pub mod config;
pub mod crypto;
pub mod error;
pub mod mef;
pub mod model;
pub mod pipeline;
pub mod serializer;
pub mod signature;
pub mod soap;
pub mod telemetry;
pub mod validation;

pub use error::{Error, Result};
