use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const QUERY_CANCELED: &str = "57014";

/// Translate driver errors into repository errors using Postgres SQLSTATE codes.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                };
            }
            // A referenced user or group vanished between form render and submit.
            Some(FOREIGN_KEY_VIOLATION) => {
                return RepoError::InvalidInput {
                    message: db.message().to_string(),
                };
            }
            Some(QUERY_CANCELED) => return RepoError::Timeout,
            Some(code) if code.starts_with("23") => {
                return RepoError::Integrity {
                    message: db.message().to_string(),
                };
            }
            _ => {}
        },
        _ => {}
    }
    RepoError::from_persistence(err)
}
