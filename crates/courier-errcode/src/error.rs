//! [`CodeError`]: an error classified with an [`ErrCode`].

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

use crate::ErrCode;

/// Any error that can cross a task boundary.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// An error carrying an [`ErrCode`], an optional cause and a stack trace.
///
/// The trace is captured once, where the failure is first classified. When
/// the cause chain already holds a `CodeError` with a trace, wrapping it
/// again does not capture a second one, so re-wrapping along a call chain
/// never produces competing traces.
///
/// The display form is `"[context: ]<code>: <message>"`:
///
/// ```rust
/// use courier_errcode::{with_code, ERR_PARAM};
///
/// let err = with_code!(ERR_PARAM; "unknown route {}", "v1/nope");
/// assert_eq!(err.to_string(), "unknown route v1/nope: 40000000: ErrParam");
/// assert_eq!(err.message(), "ErrParam");
/// ```
pub struct CodeError {
    code: ErrCode,
    context: Option<String>,
    source: Option<BoxError>,
    backtrace: Option<Backtrace>,
}

impl CodeError {
    /// Creates an error with no underlying cause.
    pub fn new(code: &ErrCode) -> Self {
        Self::wrap(code, None)
    }

    /// Creates an error caused by `source`.
    pub fn with_source(code: &ErrCode, source: impl Into<BoxError>) -> Self {
        Self::wrap(code, Some(source.into()))
    }

    /// Creates an error with an optional cause.
    pub fn wrap(code: &ErrCode, source: Option<BoxError>) -> Self {
        let traced = source
            .as_deref()
            .is_some_and(|source| find_backtrace(source).is_some());
        Self {
            code: code.clone(),
            context: None,
            source,
            backtrace: (!traced).then(Backtrace::force_capture),
        }
    }

    /// Adds a human message layer in front of the code.
    ///
    /// The code is unchanged. Layers stack outermost first, like
    /// `"outer: inner: 40000000: ErrParam"`.
    pub fn context(mut self, message: impl fmt::Display) -> Self {
        self.context = Some(match self.context.take() {
            Some(inner) => format!("{message}: {inner}"),
            None => message.to_string(),
        });
        self
    }

    /// The code this error was classified with.
    pub fn err_code(&self) -> &ErrCode {
        &self.code
    }

    pub fn code(&self) -> u32 {
        self.code.code()
    }

    pub fn category_code(&self) -> u32 {
        self.code.category_code()
    }

    pub fn platform_code(&self) -> u32 {
        self.code.platform_code()
    }

    pub fn specific_code(&self) -> u32 {
        self.code.specific_code()
    }

    /// The description registered with the code (not the context layer).
    pub fn message(&self) -> &str {
        self.code.message()
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Returns `true` if this error carries exactly the declaration `code`.
    pub fn is_err_code(&self, code: &ErrCode) -> bool {
        self.code.is_err_code(code)
    }

    /// The stack trace for this failure, whether captured here or by a
    /// `CodeError` further down the cause chain.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        find_backtrace(self)
    }

    /// Renders the error with every cause and the stack trace.
    pub fn report(&self) -> Report<'_> {
        Report(self)
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{context}: ")?;
        }
        write!(f, "{}", self.code)
    }
}

impl fmt::Debug for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeError")
            .field("code", &self.code)
            .field("context", &self.context)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Error for CodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Full rendering of a [`CodeError`], see [`CodeError::report`].
pub struct Report<'a>(&'a CodeError);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut cause = self.0.source();
        while let Some(err) = cause {
            write!(f, "\ncaused by: {err}")?;
            cause = err.source();
        }
        if let Some(bt) = self.0.backtrace() {
            if bt.status() == BacktraceStatus::Captured {
                write!(f, "\n\nstack backtrace:\n{bt}")?;
            }
        }
        Ok(())
    }
}

fn find_backtrace<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a Backtrace> {
    let mut cur = Some(err);
    while let Some(err) = cur {
        if let Some(bt) = err
            .downcast_ref::<CodeError>()
            .and_then(|ce| ce.backtrace.as_ref())
        {
            return Some(bt);
        }
        cur = err.source();
    }
    None
}

/// Finds the first [`CodeError`] in `err`'s cause chain, `err` included.
pub fn as_code_error<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a CodeError> {
    let mut cur = Some(err);
    while let Some(err) = cur {
        if let Some(ce) = err.downcast_ref::<CodeError>() {
            return Some(ce);
        }
        cur = err.source();
    }
    None
}

/// Reports whether `err`'s chain holds a [`CodeError`].
///
/// With `Some(code)`, the found error must carry that exact declaration;
/// a different declaration packing to the same integer does not match.
pub fn is_code_error(err: &(dyn Error + 'static), code: Option<&ErrCode>) -> bool {
    match (as_code_error(err), code) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(ce), Some(code)) => ce.is_err_code(code),
    }
}

/// Builds a [`CodeError`].
///
/// ```rust
/// use courier_errcode::{with_code, ERR_INTERNAL_SERVER, ERR_PARAM};
///
/// let io = std::io::Error::other("disk gone");
///
/// let a = with_code!(ERR_PARAM);
/// let b = with_code!(ERR_PARAM; "bad field {}", "id");
/// let c = with_code!(ERR_INTERNAL_SERVER, io);
/// let d = with_code!(ERR_INTERNAL_SERVER, c, "saving {}", 42);
/// assert_eq!(d.to_string(), "saving 42: 50000000: ErrInternalServer");
/// # let _ = (a, b);
/// ```
#[macro_export]
macro_rules! with_code {
    ($code:expr; $($fmt:tt)+) => {
        $crate::CodeError::new(&$code).context(::std::format!($($fmt)+))
    };
    ($code:expr $(,)?) => {
        $crate::CodeError::new(&$code)
    };
    ($code:expr, $source:expr $(,)?) => {
        $crate::CodeError::with_source(&$code, $source)
    };
    ($code:expr, $source:expr, $($fmt:tt)+) => {
        $crate::CodeError::with_source(&$code, $source)
            .context(::std::format!($($fmt)+))
    };
}
