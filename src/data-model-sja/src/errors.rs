#[derive(Debug)]
pub enum Error {
    RecordNotFound,
    DbError(diesel::result::Error),
    DbPoolError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound => write!(f, "Record not found in database."),
            Self::DbError(diesel_error) => write!(f, "Database error: {}", diesel_error),
            Self::DbPoolError(pool_error_desc) => write!(f, "Database pool error: {}", pool_error_desc),
        }
    }
}

impl std::error::Error for Error {}

impl From<diesel::result::Error> for Error {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => Self::RecordNotFound,
            _ => Self::DbError(error),
        }
    }
}

impl<E: std::fmt::Debug> From<deadpool::managed::PoolError<E>> for Error {
    fn from(error: deadpool::managed::PoolError<E>) -> Self {
        Self::DbPoolError(format!("{:?}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::RecordNotFound.to_string(), "Record not found in database.");
        assert_eq!(
            Error::DbPoolError("connection refused".to_string()).to_string(),
            "Database pool error: connection refused"
        );
    }

    #[test]
    fn test_error_from_diesel_not_found() {
        let error: Error = diesel::result::Error::NotFound.into();
        assert!(matches!(error, Error::RecordNotFound));
    }

    #[test]
    fn test_error_from_other_diesel_error() {
        let error: Error = diesel::result::Error::RollbackTransaction.into();
        assert!(matches!(error, Error::DbError(_)));
    }
}
