/// Engine-level error. Collection failures that are tolerable degrade to
/// warnings inside the processor; everything surfaced here is fatal to the
/// running pipeline.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] crate::http::Error),
    #[error("offline artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unrecognized mode: {0}")]
    InvalidMode(String),
}
