pub mod retry;
pub mod status;

pub use tokio_util::sync::CancellationToken;
