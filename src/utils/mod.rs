//! Shared helpers for the HTTP layer.

mod validate;

pub use validate::ValidatedJson;
