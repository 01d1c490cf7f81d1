//! Conversion of diesel errors into structured engine errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::error::EngineError;

/// Maps diesel errors onto [`EngineError`] variants with operation context.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a diesel error, attaching the logical operation name.
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> EngineError {
        match error {
            DieselError::NotFound => EngineError::NotFound {
                entity: operation.to_string(),
                field: "query".to_string(),
                value: "no rows".to_string(),
            },
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => EngineError::BadRequest {
                        message: format!("Duplicate entry: {message}"),
                    },
                    DatabaseErrorKind::ForeignKeyViolation => EngineError::BadRequest {
                        message: format!("Referenced row missing: {message}"),
                    },
                    _ => EngineError::Database {
                        operation: operation.to_string(),
                        source: anyhow::anyhow!(message),
                    },
                }
            }
            other => EngineError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found() {
        let err = DatabaseErrorConverter::convert_diesel_error(DieselError::NotFound, "fetch");
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn rollback_maps_to_database_error() {
        let err = DatabaseErrorConverter::convert_diesel_error(
            DieselError::RollbackTransaction,
            "enqueue",
        );
        match err {
            EngineError::Database { operation, .. } => assert_eq!(operation, "enqueue"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
