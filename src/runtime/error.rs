#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("runtime rejected request: {0}")]
    Rejected(String),
}
pub type Result<T> = std::result::Result<T, Error>;
