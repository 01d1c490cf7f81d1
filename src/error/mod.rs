//! Error handling for the delivery engine.

mod database_converter;
mod delivery;
mod engine_error;

pub use database_converter::DatabaseErrorConverter;
pub use delivery::{DeliveryError, classify_reqwest_error, classify_status};
pub use engine_error::{EngineError, EngineResult, FieldError};
