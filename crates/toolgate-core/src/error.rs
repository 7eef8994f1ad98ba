use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use toolgate_core::Error;
    /// let err = Error::config_error("tools.name_format must be one of as-is, snake, lower, upper");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Helper for creating authentication errors
    ///
    /// # Example
    /// ```
    /// use toolgate_core::Error;
    /// let err = Error::auth_error("BASIC_AUTH must look like user:pass");
    /// ```
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }
}
