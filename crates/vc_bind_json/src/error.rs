use thiserror::Error;
use vc_bind::BindError;

/// Errors of the JSON entry points.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JsonError {
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The text is not well-formed JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The encoder finished without closing every object and array.
    #[error("incomplete document")]
    Incomplete,
}

impl JsonError {
    /// The binding error, if this is one.
    #[inline]
    pub fn as_bind(&self) -> Option<&BindError> {
        match self {
            JsonError::Bind(error) => Some(error),
            _ => None,
        }
    }
}
