//! Turning a dispatch outcome into a response envelope.
//!
//! The formatter decides two things for a failed request: which
//! [`ErrCode`] the client sees, and how much of the error text goes into
//! the `details` field.
//!
//! ## Code resolution
//!
//! ```text
//! error ── CodeError in source chain? ──yes──→ its code, unchanged
//!                    │
//!                    no
//!                    ▼
//!        classifier(error) ──Some──→ that code
//!                    │
//!                   None
//!                    ▼
//!           ERR_INTERNAL_SERVER
//! ```
//!
//! ## Details
//!
//! | level        | `details`                                          |
//! |--------------|----------------------------------------------------|
//! | `none`       | absent                                             |
//! | `normal`     | top-line message                                   |
//! | `with-cause` | top-line message `:` immediate cause               |
//! | `full`       | top line, every cause, and the captured backtrace  |
//!
//! Anything above `none` can leak internals to clients, so `none` is the
//! default.

use std::error::Error;
use std::sync::Arc;

use courier_errcode::{
    BoxError, CodeError, ERR_INTERNAL_SERVER, ErrCode, as_code_error,
    take_code_priority,
};
use courier_protocol::{Header, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How much error text a failed response discloses.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DetailsLevel {
    #[default]
    None,
    Normal,
    WithCause,
    Full,
}

/// Maps an error without a code to one. Return `None` to fall through to
/// `ERR_INTERNAL_SERVER`.
pub type Classifier =
    Arc<dyn Fn(&(dyn Error + 'static)) -> Option<ErrCode> + Send + Sync>;

/// Builds response envelopes with a fixed details policy.
#[derive(Clone, Default)]
pub struct ResponseFormatter {
    details: DetailsLevel,
    classifier: Option<Classifier>,
}

impl ResponseFormatter {
    pub fn new(details: DetailsLevel) -> Self {
        Self {
            details,
            classifier: None,
        }
    }

    pub fn with_details(mut self, details: DetailsLevel) -> Self {
        self.details = details;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn details(&self) -> DetailsLevel {
        self.details
    }

    /// Builds the envelope for one request.
    ///
    /// ```rust
    /// use courier::{DetailsLevel, ResponseFormatter};
    /// use courier_errcode::{with_code, ERR_PARAM};
    /// use courier_protocol::Header;
    ///
    /// let formatter = ResponseFormatter::new(DetailsLevel::Normal);
    /// let err = with_code!(ERR_PARAM; "unknown route {}", "missing");
    ///
    /// let resp = formatter.format(Header::route("", "missing"), Err(err.into()));
    /// assert_eq!(resp.code, 40000000);
    /// assert_eq!(resp.message, "ErrParam");
    /// assert_eq!(
    ///     resp.details.as_deref(),
    ///     Some("unknown route missing: 40000000: ErrParam")
    /// );
    /// ```
    pub fn format(
        &self,
        header: Header,
        outcome: Result<Value, BoxError>,
    ) -> Response {
        match outcome {
            Ok(data) => Response::success(header, Some(data)),
            Err(err) => self.failure(header, err),
        }
    }

    fn failure(&self, header: Header, err: BoxError) -> Response {
        if let Some(ce) = as_code_error(&*err) {
            return self.render(header, ce);
        }
        let ce = self.classify(err);
        self.render(header, &ce)
    }

    /// Wraps a code-less error with the classifier's code, or
    /// `ERR_INTERNAL_SERVER`.
    fn classify(&self, err: BoxError) -> CodeError {
        let code = {
            let classified =
                || self.classifier.as_ref().and_then(|classify| classify(&*err));
            let fallback = || Some(ERR_INTERNAL_SERVER.clone());
            take_code_priority(&[&classified, &fallback])
        };
        let code = code.unwrap_or_else(|| ERR_INTERNAL_SERVER.clone());
        CodeError::with_source(&code, err)
    }

    fn render(&self, header: Header, ce: &CodeError) -> Response {
        Response::failure(header, ce.code(), ce.message(), self.describe(ce))
    }

    fn describe(&self, ce: &CodeError) -> Option<String> {
        match self.details {
            DetailsLevel::None => None,
            DetailsLevel::Normal => Some(ce.to_string()),
            DetailsLevel::WithCause => Some(match ce.source() {
                Some(cause) => format!("{ce}:{cause}"),
                None => ce.to_string(),
            }),
            DetailsLevel::Full => Some(ce.report().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use courier_errcode::{ERR_PARAM, with_code};
    use serde_json::json;

    use super::*;

    static ERR_USER_NOT_FOUND: LazyLock<ErrCode> =
        LazyLock::new(|| ErrCode::new(404, 10, 1, "ErrUserNotFound"));

    #[derive(Debug, thiserror::Error)]
    #[error("lookup failed")]
    struct Wrapper(#[source] CodeError);

    fn io_err() -> BoxError {
        Box::new(std::io::Error::other("disk gone"))
    }

    #[test]
    fn test_success_envelope() {
        let resp = ResponseFormatter::default()
            .format(Header::route("v1", "echo"), Ok(json!({"msgResp": "HI"})));
        assert!(resp.is_success());
        assert_eq!(resp.message, "Success");
        assert_eq!(resp.data, Some(json!({"msgResp": "HI"})));
        assert!(resp.details.is_none());
    }

    #[test]
    fn test_code_error_passes_through_wrappers() {
        let err = Wrapper(with_code!(ERR_USER_NOT_FOUND; "user {}", 7));
        let resp = ResponseFormatter::default().format(Header::new(), Err(err.into()));
        assert_eq!(resp.code, 40410001);
        assert_eq!(resp.message, "ErrUserNotFound");
        assert_eq!(resp.data, None);
    }

    #[test]
    fn test_plain_error_falls_back_to_internal() {
        let resp = ResponseFormatter::default().format(Header::new(), Err(io_err()));
        assert_eq!(resp.code, ERR_INTERNAL_SERVER.code());
        assert_eq!(resp.message, "ErrInternalServer");
        assert!(resp.details.is_none());
    }

    #[test]
    fn test_classifier_takes_priority() {
        let classifier: Classifier = Arc::new(|err: &(dyn Error + 'static)| {
            err.downcast_ref::<std::io::Error>()
                .map(|_| ERR_USER_NOT_FOUND.clone())
        });
        let formatter = ResponseFormatter::default().with_classifier(classifier);

        let resp = formatter.format(Header::new(), Err(io_err()));
        assert_eq!(resp.code, 40410001);

        // Not an io::Error: the classifier declines.
        let resp = formatter.format(Header::new(), Err("plain".into()));
        assert_eq!(resp.code, 50000000);
    }

    #[test]
    fn test_details_levels() {
        let err = || -> BoxError { Box::new(with_code!(ERR_PARAM, io_err(), "bad input")) };

        let none = ResponseFormatter::new(DetailsLevel::None).format(Header::new(), Err(err()));
        assert!(none.details.is_none());
        assert!(serde_json::to_value(&none).unwrap().get("details").is_none());

        let normal = ResponseFormatter::new(DetailsLevel::Normal).format(Header::new(), Err(err()));
        assert_eq!(normal.details.as_deref(), Some("bad input: 40000000: ErrParam"));

        let with_cause =
            ResponseFormatter::new(DetailsLevel::WithCause).format(Header::new(), Err(err()));
        assert_eq!(
            with_cause.details.as_deref(),
            Some("bad input: 40000000: ErrParam:disk gone")
        );

        let full = ResponseFormatter::new(DetailsLevel::Full).format(Header::new(), Err(err()));
        let details = full.details.unwrap();
        assert!(details.starts_with("bad input: 40000000: ErrParam\ncaused by: disk gone"));
        assert!(details.contains("stack backtrace:"));
    }

    #[test]
    fn test_with_cause_without_cause() {
        let resp = ResponseFormatter::new(DetailsLevel::WithCause)
            .format(Header::new(), Err(with_code!(ERR_PARAM).into()));
        assert_eq!(resp.details.as_deref(), Some("40000000: ErrParam"));
    }

    #[test]
    fn test_classified_error_details_show_original_cause() {
        let resp = ResponseFormatter::new(DetailsLevel::WithCause).format(Header::new(), Err(io_err()));
        assert_eq!(resp.details.as_deref(), Some("50000000: ErrInternalServer:disk gone"));
    }

    #[test]
    fn test_details_level_serde() {
        assert_eq!(serde_json::to_value(DetailsLevel::WithCause).unwrap(), json!("with-cause"));
        let level: DetailsLevel = serde_json::from_value(json!("full")).unwrap();
        assert_eq!(level, DetailsLevel::Full);
    }
}
