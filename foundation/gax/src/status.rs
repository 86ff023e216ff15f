use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

use serde::Deserialize;

/// A status describing the failure of a Google Cloud REST call.
///
/// Built from the HTTP status line plus the JSON error payload
/// (`{"error": {"code", "message", "status", "details"}}`) when one is
/// present. Bodies that are not JSON keep the raw text as the message.
#[derive(Clone, PartialEq, Eq)]
pub struct Status {
    http_status: u16,
    code: Code,
    message: String,
    retry_delay: Option<Duration>,
}

/// Wire shape of the REST error envelope.
#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    status: String,
    details: Vec<serde_json::Value>,
}

const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";

impl Status {
    /// Parse a non-2xx response body into a status.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => Status {
                http_status,
                code: Code::from_status_str(&parsed.error.status),
                retry_delay: retry_delay_from_details(&parsed.error.details),
                message: parsed.error.message,
            },
            Err(_) => Status {
                http_status,
                code: Code::from_http_status(http_status),
                message: body.to_string(),
                retry_delay: None,
            },
        }
    }

    /// Status representing a client-side cancellation.
    pub fn cancelled() -> Self {
        Status {
            http_status: 0,
            code: Code::Cancelled,
            message: "operation cancelled".to_string(),
            retry_delay: None,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Server-supplied `google.rpc.RetryInfo` delay, when the error carried one.
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_delay
    }

    /// The caller lacks an IAM permission on the target.
    pub fn is_permission_denied(&self) -> bool {
        self.code == Code::PermissionDenied
            || contains_any(
                &self.message,
                &["permission denied", "does not have", "AccessDeniedException"],
            )
    }

    /// The service API is not enabled on the target project.
    pub fn is_service_disabled(&self) -> bool {
        contains_any(
            &self.message,
            &[
                "SERVICE_DISABLED",
                "API has not been enabled",
                "API has not been used",
                "Access Not Configured",
            ],
        ) || (self.message.contains("has not been used") && self.message.contains("before or it is disabled"))
    }

    /// Quota or rate limit exhaustion. The only retryable classification.
    pub fn is_resource_exhausted(&self) -> bool {
        self.code == Code::ResourceExhausted
            || contains_any(&self.message, &["Quota exceeded", "RATE_LIMIT_EXCEEDED"])
    }
}

fn contains_any(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| message.contains(n))
}

/// Pull the retry delay out of a `google.rpc.RetryInfo` detail entry.
///
/// REST surfaces serialize the delay either as a duration string (`"30s"`,
/// `"1.5s"`) or as a `{seconds, nanos}` object.
fn retry_delay_from_details(details: &[serde_json::Value]) -> Option<Duration> {
    for detail in details {
        if detail.get("@type").and_then(|t| t.as_str()) != Some(RETRY_INFO_TYPE) {
            continue;
        }
        let delay = detail.get("retryDelay")?;
        if let Some(text) = delay.as_str() {
            if let Some(d) = parse_duration_str(text) {
                return Some(d);
            }
        }
        if let Some(seconds) = delay.get("seconds") {
            let secs = seconds
                .as_u64()
                .or_else(|| seconds.as_str().and_then(|s| s.parse().ok()))?;
            let nanos = delay.get("nanos").and_then(|n| n.as_u64()).unwrap_or(0) as u32;
            return Some(Duration::new(secs, nanos));
        }
    }
    None
}

fn parse_duration_str(text: &str) -> Option<Duration> {
    let seconds: f64 = text.strip_suffix('s')?.parse().ok()?;
    if seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

impl Error for Status {}

impl Debug for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Status")
            .field("http_status", &self.http_status)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {} (http {})", self.code, self.message, self.http_status)
    }
}

/// Canonical `google.rpc.Code` values as they appear in REST error payloads.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    pub fn from_status_str(status: &str) -> Code {
        match status {
            "OK" => Code::Ok,
            "CANCELLED" => Code::Cancelled,
            "INVALID_ARGUMENT" => Code::InvalidArgument,
            "DEADLINE_EXCEEDED" => Code::DeadlineExceeded,
            "NOT_FOUND" => Code::NotFound,
            "ALREADY_EXISTS" => Code::AlreadyExists,
            "PERMISSION_DENIED" => Code::PermissionDenied,
            "RESOURCE_EXHAUSTED" => Code::ResourceExhausted,
            "FAILED_PRECONDITION" => Code::FailedPrecondition,
            "ABORTED" => Code::Aborted,
            "OUT_OF_RANGE" => Code::OutOfRange,
            "UNIMPLEMENTED" => Code::Unimplemented,
            "INTERNAL" => Code::Internal,
            "UNAVAILABLE" => Code::Unavailable,
            "DATA_LOSS" => Code::DataLoss,
            "UNAUTHENTICATED" => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    /// Fallback mapping for error bodies without a parseable payload.
    pub fn from_http_status(http_status: u16) -> Code {
        match http_status {
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            409 => Code::AlreadyExists,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            501 => Code::Unimplemented,
            503 => Code::Unavailable,
            504 => Code::DeadlineExceeded,
            _ => Code::Unknown,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_rest_error_payload() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        let status = Status::from_response(403, body);
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.is_permission_denied());
        assert!(!status.is_resource_exhausted());
        assert_eq!(status.retry_delay(), None);
    }

    #[test]
    fn falls_back_to_http_status_on_non_json_body() {
        let status = Status::from_response(429, "<html>slow down</html>");
        assert_eq!(status.code(), Code::ResourceExhausted);
        assert!(status.is_resource_exhausted());
    }

    #[test]
    fn classifies_service_disabled_messages() {
        for message in [
            "Compute Engine API has not been used in project 1234 before or it is disabled",
            "Access Not Configured. Cloud Functions API has not been used",
            "SERVICE_DISABLED",
        ] {
            let body = format!(
                r#"{{"error": {{"code": 403, "message": "{message}", "status": "PERMISSION_DENIED"}}}}"#
            );
            let status = Status::from_response(403, &body);
            assert!(status.is_service_disabled(), "{message}");
        }
    }

    #[test]
    fn classifies_quota_messages_without_code() {
        let body = r#"{"error": {"code": 403, "message": "Quota exceeded for quota metric 'Read requests'", "status": "FORBIDDEN"}}"#;
        let status = Status::from_response(403, body);
        assert!(status.is_resource_exhausted());
    }

    #[test]
    fn reads_retry_info_duration_string() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED",
            "details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "17s"}]}}"#;
        let status = Status::from_response(429, body);
        assert_eq!(status.retry_delay(), Some(Duration::from_secs(17)));
    }

    #[test]
    fn reads_retry_info_object_form() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED",
            "details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": {"seconds": 42, "nanos": 500000000}}]}}"#;
        let status = Status::from_response(429, body);
        assert_eq!(status.retry_delay(), Some(Duration::new(42, 500_000_000)));
    }

    #[test]
    fn ignores_unrelated_details() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED",
            "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "RATE_LIMIT_EXCEEDED"}]}}"#;
        let status = Status::from_response(429, body);
        assert_eq!(status.retry_delay(), None);
    }
}
