pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the toolkit. Module-specific failures keep their
/// own enums and convert into this one at the crate boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Occurs when an environment configuration file fails to load.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),
    #[error(transparent)]
    Http(#[from] crate::http::Error),
    #[error(transparent)]
    Assertion(#[from] crate::validator::AssertionError),
}
