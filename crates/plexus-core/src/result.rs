//! Result alias for fallible runtime operations.

use crate::error::AppError;

/// `Result` specialized to [`AppError`].
pub type AppResult<T> = Result<T, AppError>;
