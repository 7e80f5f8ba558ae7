//! Packed error codes and the strategies that pack them.
//!
//! An [`ErrCode`] is a single integer plus a human description. The integer
//! is built from three parts:
//!
//! ```text
//!   40410001
//!   ───┬──── category 404 (mirrors HTTP status ranges)
//!      ──┬── platform  10
//!        ─┬─ specific 001
//! ```
//!
//! How the parts are packed is a [`CodeCombiner`]. The default,
//! [`Combiner323`], gives the category everything above 100000, the
//! platform two digits and the specific code three digits. A different
//! strategy is installed by building codes through a [`CodeSystem`].

use std::fmt;
use std::sync::{Arc, LazyLock};

/// Category: the request itself is wrong.
pub const CC_BAD_REQUEST: u32 = 400;
/// Category: the caller is not authenticated.
pub const CC_UNAUTHORIZED: u32 = 401;
/// Category: the caller may not do this.
pub const CC_FORBIDDEN: u32 = 403;
/// Category: the target does not exist.
pub const CC_NOT_FOUND: u32 = 404;
/// Category: the server failed.
pub const CC_INTERNAL_SERVER: u32 = 500;
/// Category: the operation is not implemented.
pub const CC_NOT_IMPLEMENTED: u32 = 501;
/// Category: nothing better is known. Reported as HTTP 500.
pub const CC_UNKNOWN: u32 = 900;

/// Packs and unpacks the three parts of an error code.
///
/// Implementations must round-trip for every value inside their digit
/// widths: `separate(combine(c, p, s)) == (c, p, s)`. Out-of-range input
/// must not panic; what it produces is up to the implementation.
pub trait CodeCombiner: Send + Sync + 'static {
    /// Packs `(category, platform, specific)` into one code.
    fn combine(&self, category: u32, platform: u32, specific: u32) -> u32;

    /// Splits a packed code back into `(category, platform, specific)`.
    fn separate(&self, code: u32) -> (u32, u32, u32);
}

/// The default 3-2-3 digit layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner323;

impl CodeCombiner for Combiner323 {
    fn combine(&self, category: u32, platform: u32, specific: u32) -> u32 {
        // Out-of-range input wraps.
        category
            .wrapping_mul(100_000)
            .wrapping_add(platform.wrapping_mul(1_000))
            .wrapping_add(specific)
    }

    fn separate(&self, code: u32) -> (u32, u32, u32) {
        (code / 100_000, code / 1_000 % 100, code % 1_000)
    }
}

static DEFAULT_COMBINER: LazyLock<Arc<dyn CodeCombiner>> =
    LazyLock::new(|| Arc::new(Combiner323));

/// Builds error codes with one chosen [`CodeCombiner`].
///
/// This is the explicit replacement for a process-wide "current combiner":
/// construct one at startup, then declare every code through it. Codes
/// remember the combiner that built them, so their part accessors always
/// agree with how they were packed.
#[derive(Clone)]
pub struct CodeSystem {
    combiner: Arc<dyn CodeCombiner>,
}

impl CodeSystem {
    /// Creates a code system using the given strategy.
    pub fn new(combiner: impl CodeCombiner) -> Self {
        Self {
            combiner: Arc::new(combiner),
        }
    }

    /// Declares a new error code. Meant to be called once per code.
    pub fn new_err_code(
        &self,
        category: u32,
        platform: u32,
        specific: u32,
        message: impl Into<String>,
    ) -> ErrCode {
        ErrCode(Arc::new(ErrCodeInner {
            code: self.combiner.combine(category, platform, specific),
            message: message.into(),
            combiner: Arc::clone(&self.combiner),
        }))
    }

    /// Packs three parts with this system's strategy.
    pub fn combine(&self, category: u32, platform: u32, specific: u32) -> u32 {
        self.combiner.combine(category, platform, specific)
    }

    /// Splits a packed code with this system's strategy.
    pub fn separate(&self, code: u32) -> (u32, u32, u32) {
        self.combiner.separate(code)
    }
}

impl Default for CodeSystem {
    fn default() -> Self {
        Self {
            combiner: Arc::clone(&DEFAULT_COMBINER),
        }
    }
}

impl fmt::Debug for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSystem").finish_non_exhaustive()
    }
}

/// Splits a code packed with the default strategy.
pub fn separate_code(code: u32) -> (u32, u32, u32) {
    DEFAULT_COMBINER.separate(code)
}

struct ErrCodeInner {
    code: u32,
    message: String,
    combiner: Arc<dyn CodeCombiner>,
}

/// A declared error code: packed integer plus description.
///
/// Cloning is cheap and keeps the identity: every clone refers to the same
/// declaration. [`is_err_code`](Self::is_err_code) compares identity, so
/// two codes declared separately are different codes even when they pack
/// to the same integer. Compare [`code`](Self::code) values if numeric
/// equality is what you want.
///
/// ```rust
/// use courier_errcode::{CC_NOT_FOUND, ErrCode};
///
/// let not_found = ErrCode::new(CC_NOT_FOUND, 10, 1, "ErrUserNotFound");
/// assert_eq!(not_found.code(), 40410001);
/// assert_eq!(not_found.platform_code(), 10);
/// ```
#[derive(Clone)]
pub struct ErrCode(Arc<ErrCodeInner>);

impl ErrCode {
    /// Declares a code using the default [`Combiner323`] strategy.
    pub fn new(
        category: u32,
        platform: u32,
        specific: u32,
        message: impl Into<String>,
    ) -> Self {
        CodeSystem::default().new_err_code(category, platform, specific, message)
    }

    /// The packed code. `0` is reserved for success.
    pub fn code(&self) -> u32 {
        self.0.code
    }

    pub fn category_code(&self) -> u32 {
        self.0.combiner.separate(self.0.code).0
    }

    pub fn platform_code(&self) -> u32 {
        self.0.combiner.separate(self.0.code).1
    }

    pub fn specific_code(&self) -> u32 {
        self.0.combiner.separate(self.0.code).2
    }

    /// The description registered with the code.
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// The HTTP status matching the category. [`CC_UNKNOWN`] maps to 500.
    pub fn http_status(&self) -> u16 {
        match self.category_code() {
            CC_UNKNOWN => 500,
            category => u16::try_from(category).unwrap_or(500),
        }
    }

    /// Returns `true` if `other` is the very same declaration.
    pub fn is_err_code(&self, other: &ErrCode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrCode")
            .field("code", &self.0.code)
            .field("message", &self.0.message)
            .finish()
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.code, self.0.message)
    }
}

/// Malformed envelopes, unknown routes and undecodable payloads.
pub static ERR_PARAM: LazyLock<ErrCode> =
    LazyLock::new(|| ErrCode::new(CC_BAD_REQUEST, 0, 0, "ErrParam"));

/// Fallback for any error nobody classified.
pub static ERR_INTERNAL_SERVER: LazyLock<ErrCode> = LazyLock::new(|| {
    ErrCode::new(CC_INTERNAL_SERVER, 0, 0, "ErrInternalServer")
});

/// Returns the first code produced by `candidates`, trying them in order.
///
/// Lets a caller-supplied classifier win over a default:
///
/// ```rust
/// use courier_errcode::{take_code_priority, ErrCode, ERR_INTERNAL_SERVER};
///
/// let classify = || None::<ErrCode>;
/// let fallback = || Some(ERR_INTERNAL_SERVER.clone());
/// let code = take_code_priority(&[&classify, &fallback]).unwrap();
/// assert!(code.is_err_code(&ERR_INTERNAL_SERVER));
/// ```
pub fn take_code_priority(
    candidates: &[&dyn Fn() -> Option<ErrCode>],
) -> Option<ErrCode> {
    candidates.iter().find_map(|candidate| candidate())
}
