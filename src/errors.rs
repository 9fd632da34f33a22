use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Stock not found: {0}")]
    StockNotFound(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(i64),

    #[error("No price recorded for stock {0}")]
    PriceNotFound(i64),

    #[error("Holding not found: portfolio {portfolio_id}, stock {stock_id}")]
    HoldingNotFound { portfolio_id: i64, stock_id: i64 },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Referenced row missing: {0}")]
    MissingReference(String),

    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Classify SQLite failures so callers can match on constraint violations
/// and contention instead of string-parsing error messages.
impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref e, ref msg) = err {
            let detail = msg.clone().unwrap_or_else(|| e.to_string());
            match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return DatabaseError::Busy(detail);
                }
                rusqlite::ErrorCode::ConstraintViolation => match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        return DatabaseError::DuplicateKey(detail);
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        return DatabaseError::MissingReference(detail);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        DatabaseError::Sqlite(err)
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
