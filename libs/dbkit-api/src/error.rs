/// Error returned by every fallible core operation.
///
/// Variants follow the failure categories of the data-access layer:
/// a destination that cannot receive rows, a result with no live cursor,
/// a row that could not be fetched into its scan buffers, and errors
/// reported by the backing driver or connection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DbError {
    #[error("bad destination: {0}")]
    BadDestination(String),

    #[error("not a valid query result")]
    InvalidResult,

    #[error("scan column '{column}': {reason}")]
    Scan { column: String, reason: String },

    #[error("operate on a bad connection")]
    BadConnection,

    #[error("driver: {0}")]
    Driver(String),
}

impl DbError {
    pub fn driver(msg: impl Into<String>) -> Self {
        DbError::Driver(msg.into())
    }

    pub fn scan(column: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::Scan {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Add context to the error, preserving the variant.
    ///
    /// Variants without a message (`InvalidResult`, `BadConnection`) are returned as-is.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            DbError::BadDestination(msg) => DbError::BadDestination(format!("{ctx}: {msg}")),
            DbError::Scan { column, reason } => DbError::Scan {
                column,
                reason: format!("{ctx}: {reason}"),
            },
            DbError::Driver(msg) => DbError::Driver(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_variant() {
        let err = DbError::scan("age", "invalid digit").with_context("row 3");
        assert_eq!(
            err,
            DbError::Scan {
                column: "age".into(),
                reason: "row 3: invalid digit".into()
            }
        );
        assert_eq!(DbError::InvalidResult.with_context("x"), DbError::InvalidResult);
    }

    #[test]
    fn display_messages() {
        assert_eq!(DbError::InvalidResult.to_string(), "not a valid query result");
        assert_eq!(
            DbError::BadConnection.to_string(),
            "operate on a bad connection"
        );
    }
}
