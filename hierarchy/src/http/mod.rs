//! Hand-written REST clients for the Google services the collectors consume.
//!
//! Each client owns an [`AuthorizedClient`] over an opaque token source,
//! builds plain `reqwest` requests, and maps non-2xx responses into a
//! classified [`Status`]. Every call accepts an optional cancellation token
//! and goes through the quota-aware retry wrapper.

pub mod compute;
pub mod deploymentmanager;
pub mod functions;
pub mod iam;
pub mod resourcemanager;
pub mod run;
pub mod secretmanager;
pub mod storage;

use std::sync::Arc;

use iamgraph_gax::retry::TryAs;
use iamgraph_gax::status::Status;
use token_source::TokenSource;

pub use iamgraph_gax::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Response(#[from] Status),
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),
    #[error(transparent)]
    ResponseJson(#[from] serde_json::Error),
    #[error("token source error: {0}")]
    TokenSource(String),
}

impl TryAs<Status> for Error {
    fn try_as(&self) -> Option<&Status> {
        match self {
            Error::Response(status) => Some(status),
            _ => None,
        }
    }
}

impl Error {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::Response(s) if s.is_permission_denied())
    }

    pub fn is_service_disabled(&self) -> bool {
        matches!(self, Error::Response(s) if s.is_service_disabled())
    }
}

/// Shared authorized transport: attaches the bearer token, sends, and maps
/// non-2xx responses into a classified [`Status`].
#[derive(Clone)]
pub(crate) struct AuthorizedClient {
    http: reqwest::Client,
    ts: Arc<dyn TokenSource>,
}

impl AuthorizedClient {
    pub(crate) fn new(http: reqwest::Client, ts: Arc<dyn TokenSource>) -> Self {
        Self { http, ts }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn send<T: for<'de> serde::Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let token = self
            .ts
            .token()
            .await
            .map_err(|e| Error::TokenSource(e.to_string()))?;
        let response = builder.bearer_auth(token).send().await?;
        if response.status().is_success() {
            let text = response.text().await?;
            tracing::trace!("response={}", text);
            Ok(serde_json::from_str(&text)?)
        } else {
            Err(map_error(response).await.into())
        }
    }
}

async fn map_error(response: reqwest::Response) -> Status {
    let http_status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|e| e.to_string());
    Status::from_response(http_status, &body)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_classification_passes_through() {
        let status = Status::from_response(
            403,
            r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#,
        );
        let error = Error::from(status);
        assert!(error.is_permission_denied());
        assert!(!error.is_service_disabled());
        assert!(error.try_as().is_some());
    }
}
