// sqlx::Error -> AppError mapping

use ticpass_core::error::AppError;

/// Convert sqlx::Error to AppError::Storage with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let Some(code) = db_err.code() else {
                return AppError::Storage(format!("Database error: {}", db_err.message()));
            };
            let code_str = code.as_ref();

            // SQLite error codes: https://www.sqlite.org/rescode.html
            match code_str {
                "2067" | "1555" => AppError::Storage(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code_str
                )),
                "5" => {
                    // SQLITE_BUSY - database is locked
                    AppError::Storage(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    ))
                }
                "13" => AppError::Storage(format!("Database full: {}", db_err.message())),
                _ => AppError::Storage(format!(
                    "Database error [{}]: {}",
                    code_str,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Storage(format!("Column not found: {}", col))
        }
        sqlx::Error::PoolTimedOut => {
            AppError::Storage("Timed out waiting for a pooled connection".to_string())
        }
        _ => AppError::Storage(err.to_string()),
    }
}
