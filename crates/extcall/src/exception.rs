use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can raise into the runtime's error channel.
pub type RunResult<T> = Result<T, RunError>;

/// Exception classes raised by the marshaling layer.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Misuse of the C-level API: bad format strings, null handles, malformed specs.
    SystemError,
    TypeError,
    ValueError,
    /// Subclass of ValueError - for decoding errors of `char *` arguments.
    UnicodeDecodeError,
    MemoryError,
    RecursionError,
}

impl ExcType {
    /// Returns true if `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        self == handler_type || matches!((self, handler_type), (Self::UnicodeDecodeError, Self::ValueError))
    }

    /// Creates the error raised when a C caller violates an API contract.
    ///
    /// Matches CPython's `PyErr_BadInternalCall`: `SystemError: bad argument to internal function`
    #[must_use]
    pub fn bad_internal_call() -> RunError {
        SimpleException::new_msg(Self::SystemError, "bad argument to internal function").into()
    }

    /// Creates a simple SystemError with a custom message.
    #[must_use]
    pub fn system_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::SystemError, msg).into()
    }

    /// Creates a simple TypeError with a custom message.
    #[must_use]
    pub fn type_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    /// Creates a TypeError for a value that cannot be used as a dict key.
    ///
    /// Matches CPython's format: `TypeError: unhashable type: '{type}'`
    #[must_use]
    pub fn type_error_unhashable(type_name: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("unhashable type: '{type_name}'")).into()
    }

    /// Creates the error raised when nested data exceeds the traversal depth limit.
    #[must_use]
    pub fn recursion_error() -> RunError {
        SimpleException::new_msg(Self::RecursionError, "maximum recursion depth exceeded").into()
    }

    /// Creates a ValueError for a `C` directive outside the unicode range.
    ///
    /// Matches CPython's format: `ValueError: chr() arg not in range(0x110000)`
    #[must_use]
    pub fn value_error_chr_range() -> RunError {
        SimpleException::new_msg(Self::ValueError, "chr() arg not in range(0x110000)").into()
    }

    /// Creates a ValueError for a wide character outside the unicode range.
    ///
    /// Matches CPython's format: `ValueError: character U+{ch:x} is not in range [U+0000; U+10ffff]`
    #[must_use]
    pub fn value_error_wide_char(ch: u32) -> RunError {
        SimpleException::new_msg(
            Self::ValueError,
            format!("character U+{ch:x} is not in range [U+0000; U+10ffff]"),
        )
        .into()
    }

    /// Creates a UnicodeDecodeError for invalid UTF-8 in a `char *` argument.
    ///
    /// Matches CPython's format:
    /// `'utf-8' codec can't decode byte 0x{byte:02x} in position {pos}: {reason}`
    #[must_use]
    pub fn unicode_decode_error(bytes: &[u8], err: std::str::Utf8Error) -> RunError {
        let pos = err.valid_up_to();
        let byte = bytes.get(pos).copied().unwrap_or_default();
        let reason = match err.error_len() {
            None => "unexpected end of data",
            Some(_) if (0x80..0xc2).contains(&byte) || byte >= 0xf5 => "invalid start byte",
            Some(_) => "invalid continuation byte",
        };
        SimpleException::new_msg(
            Self::UnicodeDecodeError,
            format!("'utf-8' codec can't decode byte 0x{byte:02x} in position {pos}: {reason}"),
        )
        .into()
    }
}

/// An exception with a type and an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}: {arg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl SimpleException {
    /// Creates a new exception with the given type and optional argument message.
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self { exc_type, arg }
    }

    /// Creates a new exception with the given type and argument message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, arg: impl fmt::Display) -> Self {
        Self {
            exc_type,
            arg: Some(arg.to_string()),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

/// Runtime error types that can be raised into the error channel.
///
/// Three variants:
/// - `Internal`: Bug in the marshaling layer (static message)
/// - `Exc`: ordinary exception that extension code may inspect and clear
/// - `UncatchableExc`: exception from resource limits that must reach the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunError {
    /// Internal error - indicates a bug in extcall, not in the caller.
    Internal(Cow<'static, str>),
    /// Catchable exception (e.g., TypeError, SystemError).
    Exc(Box<SimpleException>),
    /// Exception from resource limits (MemoryError).
    UncatchableExc(Box<SimpleException>),
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(Box::new(exc))
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "Internal error in extcall: {msg}"),
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.fmt(f),
        }
    }
}

impl std::error::Error for RunError {}

impl RunError {
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the exception type, or `None` for internal errors.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        match self {
            Self::Exc(exc) | Self::UncatchableExc(exc) => Some(exc.exc_type()),
            Self::Internal(_) => None,
        }
    }

    /// Returns the exception message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.message(),
            Self::Internal(msg) => Some(msg),
        }
    }

    /// Returns true if this error is a catchable exception of `exc_type`.
    #[must_use]
    pub fn is_exception_type(&self, exc_type: ExcType) -> bool {
        match self {
            Self::Exc(exc) => exc.exc_type().is_subclass_of(exc_type),
            _ => false,
        }
    }
}

/// Writes at most `max` characters of `s`, like C's `%.200s`.
pub(crate) fn write_truncated(f: &mut fmt::Formatter<'_>, s: &str, max: usize) -> fmt::Result {
    match s.char_indices().nth(max) {
        Some((end, _)) => f.write_str(&s[..end]),
        None => f.write_str(s),
    }
}
