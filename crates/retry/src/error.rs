use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Fatal,
}

/// Transport-level failure reaching an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    HostUnreachable,
    NetworkUnreachable,
    NameNotResolved,
    Other,
}

impl TransportKind {
    /// Maps an I/O error kind to the transport failure it denotes.
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::ConnectionRefused => TransportKind::ConnectionRefused,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                TransportKind::ConnectionReset
            }
            ErrorKind::TimedOut => TransportKind::Timeout,
            ErrorKind::HostUnreachable => TransportKind::HostUnreachable,
            ErrorKind::NetworkUnreachable => TransportKind::NetworkUnreachable,
            _ => TransportKind::Other,
        }
    }

    fn is_retryable(self) -> bool {
        !matches!(self, TransportKind::Other)
    }
}

const RETRYABLE_STATUSES: [u16; 5] = [408, 429, 502, 503, 504];

const UNKNOWN_ERROR: &str = "Unknown error occurred";

fn mentions_timeout(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("timeout") || lower.contains("timed out")
}

/// Failure of one attempt against an external service.
///
/// The classification is decided by the constructor used at the call site;
/// the retry engine never inspects anything else.
#[derive(Debug)]
pub struct ClassifiedError {
    classification: Classification,
    status: Option<u16>,
    transport: Option<TransportKind>,
    message: Option<String>,
    upstream_message: Option<String>,
    payload: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ClassifiedError {
    fn new(classification: Classification) -> Self {
        Self {
            classification,
            status: None,
            transport: None,
            message: None,
            upstream_message: None,
            payload: None,
            source: None,
        }
    }

    /// A response with a non-success status.
    ///
    /// 408, 429, 502, 503 and 504 are retryable, as is any status whose
    /// upstream message denotes a timeout. Everything else is fatal.
    pub fn from_status(status: u16, upstream_message: Option<String>) -> Self {
        let classification = if RETRYABLE_STATUSES.contains(&status)
            || upstream_message.as_deref().is_some_and(mentions_timeout)
        {
            Classification::Retryable
        } else {
            Classification::Fatal
        };
        Self {
            status: Some(status),
            upstream_message,
            ..Self::new(classification)
        }
    }

    /// A failure to reach the service at all.
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let classification = if kind.is_retryable() || mentions_timeout(&message) {
            Classification::Retryable
        } else {
            Classification::Fatal
        };
        Self {
            transport: Some(kind),
            message: Some(message),
            ..Self::new(classification)
        }
    }

    /// Any other failure. Retryable only when the message denotes a timeout.
    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        let classification = if mentions_timeout(&message) {
            Classification::Retryable
        } else {
            Classification::Fatal
        };
        Self {
            message: Some(message),
            ..Self::new(classification)
        }
    }

    /// A failure that must never be retried.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(Classification::Fatal)
        }
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attaches the raw response body.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_retryable(&self) -> bool {
        self.classification == Classification::Retryable
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport
    }

    /// Best available description of the failure.
    ///
    /// Tries the classified message, the upstream response message, the
    /// source error, then the raw payload.
    pub fn message(&self) -> String {
        let non_empty = |s: &&String| !s.trim().is_empty();

        if let Some(message) = self.message.as_ref().filter(non_empty) {
            return message.clone();
        }
        if let Some(message) = self.upstream_message.as_ref().filter(non_empty) {
            return message.clone();
        }
        if let Some(source) = &self.source {
            let message = source.to_string();
            if !message.trim().is_empty() {
                return message;
            }
        }
        if let Some(payload) = self.payload.as_ref().filter(non_empty) {
            return payload.clone();
        }
        UNKNOWN_ERROR.to_string()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl StdError for ClassifiedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for ClassifiedError {
    fn from(err: std::io::Error) -> Self {
        let text = err.to_string();
        let kind = match TransportKind::from_io_kind(err.kind()) {
            TransportKind::Other
                if text.contains("failed to lookup address")
                    || text.contains("Name or service not known") =>
            {
                TransportKind::NameNotResolved
            }
            kind => kind,
        };
        Self::transport(kind, text).with_source(err)
    }
}

/// Raised when a retried operation fails for good.
#[derive(Debug, Clone, Error)]
#[error("{service} request failed after {attempts} attempt(s): {message}")]
pub struct UpstreamError {
    /// Label of the external service.
    pub service: String,
    /// Upstream status when there was one, 503 for transport failures,
    /// 500 otherwise.
    pub status: u16,
    pub message: String,
    pub attempts: u32,
    pub classification: Classification,
}

impl UpstreamError {
    pub fn from_classified(service: &str, err: &ClassifiedError, attempts: u32) -> Self {
        let status = match (err.status(), err.transport_kind()) {
            (Some(status), _) => status,
            (None, Some(_)) => 503,
            (None, None) => 500,
        };
        Self {
            service: service.to_string(),
            status,
            message: err.message(),
            attempts,
            classification: err.classification(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for status in [408, 429, 502, 503, 504] {
            assert!(ClassifiedError::from_status(status, None).is_retryable());
        }
        for status in [400, 401, 404, 409, 422, 500] {
            assert!(!ClassifiedError::from_status(status, None).is_retryable());
        }
    }

    #[test]
    fn transport_failures_are_retryable() {
        let err = ClassifiedError::transport(TransportKind::ConnectionRefused, "refused");
        assert!(err.is_retryable());
        let err = ClassifiedError::transport(TransportKind::Other, "tls handshake failed");
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_messages_are_retryable() {
        assert!(ClassifiedError::other("operation Timeout after 5s").is_retryable());
        assert!(ClassifiedError::other("request timed out").is_retryable());
        assert!(!ClassifiedError::other("bad json").is_retryable());

        let err = ClassifiedError::from_status(500, Some("upstream request timed out".to_string()));
        assert_eq!(err.classification(), Classification::Retryable);
        assert!(
            ClassifiedError::from_status(400, Some("Gateway Timeout".to_string())).is_retryable()
        );
        assert!(!ClassifiedError::from_status(500, Some("boom".to_string())).is_retryable());
    }

    #[test]
    fn io_errors_map_to_transport_kinds() {
        let err: ClassifiedError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer").into();
        assert_eq!(err.transport_kind(), Some(TransportKind::ConnectionReset));
        assert!(err.is_retryable());
    }

    #[test]
    fn message_extraction_order() {
        let err = ClassifiedError::from_status(404, Some("release not found".to_string()))
            .with_payload("{\"error\":\"x\"}");
        assert_eq!(err.message(), "release not found");

        let err = ClassifiedError::from_status(500, None).with_payload("raw body");
        assert_eq!(err.message(), "raw body");

        let err = ClassifiedError::from_status(500, None);
        assert_eq!(err.message(), "Unknown error occurred");

        let err = ClassifiedError::from_status(500, Some(" ".to_string())).with_source(
            std::io::Error::other("socket closed"),
        );
        assert_eq!(err.message(), "socket closed");
    }

    #[test]
    fn upstream_status_mapping() {
        let err = ClassifiedError::from_status(404, None);
        assert_eq!(UpstreamError::from_classified("svc", &err, 1).status, 404);

        let err = ClassifiedError::transport(TransportKind::Timeout, "timeout");
        assert_eq!(UpstreamError::from_classified("svc", &err, 3).status, 503);

        let err = ClassifiedError::fatal("boom");
        let upstream = UpstreamError::from_classified("svc", &err, 1);
        assert_eq!(upstream.status, 500);
        assert!(upstream.to_string().contains("svc"));
    }
}
