use thiserror::Error;

/// Failures raised while preparing the runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Subscriber setup failed or logging was already initialized
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
