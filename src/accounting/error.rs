#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The queried mountpoint does not resolve to a filesystem known to the
    /// accounting subsystem. Callers treat this as absent data, not a fault.
    #[error("no filesystem found for mountpoint `{mountpoint}`")]
    NoSuchDevice { mountpoint: String },
    #[error("accounting backend unavailable: {0}")]
    Backend(String),
    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}
pub type Result<T> = std::result::Result<T, Error>;
