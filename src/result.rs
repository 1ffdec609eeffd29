//! Operation results
//!
//! [`OperationResult`] and [`OperationResultOf`] are the return channel of every
//! fallible repository and adapter call. An expected failure (missing key, key
//! already present, rejected input, I/O trouble) is a failed result carrying a
//! message, never a panic.
//!
//! `success` is the authoritative discriminator. A failed
//! [`OperationResultOf`] yields the payload type's default from
//! [`OperationResultOf::into_value`], so a non-default payload says nothing
//! about whether the operation succeeded.

use std::fmt;

use crate::error::Error;

/// Outcome of an operation that carries no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    success: bool,
    error_message: Option<String>,
}

impl OperationResult {
    /// Build a result. The message is dropped when `success` is true.
    pub fn new(success: bool, error_message: Option<String>) -> Self {
        Self {
            success,
            error_message: if success { None } else { error_message },
        }
    }

    /// A successful result
    pub fn successful() -> Self {
        Self::new(true, None)
    }

    /// A failed result with the given message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(false, Some(message.into()))
    }

    /// A failed result whose message is taken from `error`
    pub fn from_error<E: fmt::Display + ?Sized>(error: &E) -> Self {
        Self::failed(error.to_string())
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Whether the operation failed
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// The failure message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Re-type this verdict as a payload-carrying failure, keeping the message.
    pub fn into_failed<T>(self) -> OperationResultOf<T> {
        OperationResultOf {
            success: false,
            value: None,
            error_message: self.error_message,
        }
    }

    /// `Ok(())` on success, the result itself otherwise.
    ///
    /// Lets a chain of steps short-circuit with `?`.
    pub fn into_outcome(self) -> Result<(), OperationResult> {
        if self.success {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Convert into the crate error type
    pub fn into_result(self) -> crate::Result<()> {
        self.into_outcome().map_err(failure_to_error)
    }
}

impl Default for OperationResult {
    fn default() -> Self {
        Self::new(false, None)
    }
}

impl From<OperationResult> for bool {
    fn from(result: OperationResult) -> Self {
        result.success
    }
}

impl From<&OperationResult> for bool {
    fn from(result: &OperationResult) -> Self {
        result.success
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success: {}, ErrorMessage: {}",
            self.success,
            self.error_message.as_deref().unwrap_or_default()
        )
    }
}

/// Outcome of an operation that carries a payload
///
/// Fields are fixed at construction. A failure built without a value holds no
/// payload; [`into_value`](Self::into_value) then yields `T::default()`.
#[derive(Debug, Clone)]
pub struct OperationResultOf<T> {
    success: bool,
    value: Option<T>,
    error_message: Option<String>,
}

impl<T> OperationResultOf<T> {
    /// Build a result from explicit parts. The message is dropped on success.
    pub fn new(success: bool, value: T, error_message: Option<String>) -> Self {
        Self {
            success,
            value: Some(value),
            error_message: if success { None } else { error_message },
        }
    }

    /// A successful result carrying `value`
    pub fn from_value(value: T) -> Self {
        Self::new(true, value, None)
    }

    /// A failed result with the given message and no payload
    pub fn failure(message: impl Into<String>) -> Self {
        OperationResult::failed(message).into_failed()
    }

    /// A failed result whose message is taken from `error`
    pub fn from_error<E: fmt::Display + ?Sized>(error: &E) -> Self {
        OperationResult::from_error(error).into_failed()
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Whether the operation failed
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// The failure message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The payload, if one was supplied
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Project to the payload-less verdict, keeping success and message verbatim.
    pub fn to_plain(&self) -> OperationResult {
        OperationResult {
            success: self.success,
            error_message: self.error_message.clone(),
        }
    }

    /// The payload on success, the payload-less verdict otherwise.
    pub fn into_outcome(self) -> Result<T, OperationResult> {
        match (self.success, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(OperationResult {
                success: false,
                error_message: self.error_message,
            }),
        }
    }

    /// Convert into the crate error type
    pub fn into_result(self) -> crate::Result<T> {
        self.into_outcome().map_err(failure_to_error)
    }

    /// Transform the payload, leaving the verdict untouched
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OperationResultOf<U> {
        OperationResultOf {
            success: self.success,
            value: self.value.map(f),
            error_message: self.error_message,
        }
    }
}

impl<T: Default> OperationResultOf<T> {
    /// The payload regardless of success; `T::default()` when none was supplied.
    pub fn into_value(self) -> T {
        self.value.unwrap_or_default()
    }
}

impl<T> Default for OperationResultOf<T> {
    fn default() -> Self {
        OperationResult::default().into_failed()
    }
}

impl<T> From<T> for OperationResultOf<T> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}

impl<T> From<OperationResultOf<T>> for OperationResult {
    fn from(result: OperationResultOf<T>) -> Self {
        OperationResult {
            success: result.success,
            error_message: result.error_message,
        }
    }
}

impl<T> From<&OperationResultOf<T>> for bool {
    fn from(result: &OperationResultOf<T>) -> Self {
        result.success
    }
}

impl<T: fmt::Debug> fmt::Display for OperationResultOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Success: {}, Value: ", self.success)?;
        match &self.value {
            Some(value) => write!(f, "{value:?}")?,
            None => f.write_str("<none>")?,
        }
        write!(
            f,
            ", ErrorMessage: {}",
            self.error_message.as_deref().unwrap_or_default()
        )
    }
}

fn failure_to_error(failure: OperationResult) -> Error {
    Error::OperationFailed {
        message: failure
            .error_message
            .unwrap_or_else(|| "unspecified failure".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_failed_result_conversions() {
        let result = OperationResultOf::<u32>::new(false, u32::default(), Some("x".to_string()));

        assert!(!bool::from(&result));
        assert_eq!(result.to_plain(), OperationResult::failed("x"));

        let plain: OperationResult = result.clone().into();
        assert!(!plain.is_success());
        assert_eq!(plain.error_message(), Some("x"));

        assert_eq!(result.into_value(), 0);
    }

    #[test]
    fn test_failure_from_message_and_error_are_symmetric() {
        let error = StorageError::ResourceNotFound {
            resource: "k".to_string(),
        };
        let from_error = OperationResultOf::<String>::from_error(&error);
        let from_message = OperationResultOf::<String>::failure(error.to_string());

        assert_eq!(from_error.is_success(), from_message.is_success());
        assert_eq!(from_error.error_message(), from_message.error_message());
        assert_eq!(from_error.into_value(), from_message.into_value());
    }

    #[test]
    fn test_success_drops_message() {
        let result = OperationResultOf::new(true, 7, Some("ignored".to_string()));
        assert!(result.is_success());
        assert_eq!(result.error_message(), None);
        assert_eq!(OperationResult::new(true, Some("x".into())).error_message(), None);
    }

    #[test]
    fn test_failure_with_value_keeps_value() {
        // success is authoritative even when a payload is present
        let result = OperationResultOf::new(false, 42, Some("nope".to_string()));
        assert!(result.is_failure());
        assert_eq!(result.value(), Some(&42));
        assert!(result.into_outcome().is_err());
    }

    #[test]
    fn test_into_outcome_short_circuits() {
        fn chain(first: OperationResult) -> Result<u8, OperationResult> {
            first.into_outcome()?;
            OperationResultOf::from_value(9).into_outcome()
        }

        assert_eq!(chain(OperationResult::successful()), Ok(9));
        assert_eq!(
            chain(OperationResult::failed("stop")),
            Err(OperationResult::failed("stop"))
        );
    }

    #[test]
    fn test_into_failed_keeps_message() {
        let typed: OperationResultOf<Vec<u8>> = OperationResult::failed("bad key").into_failed();
        assert!(typed.is_failure());
        assert_eq!(typed.error_message(), Some("bad key"));
        assert!(typed.value().is_none());
    }

    #[test]
    fn test_into_result() {
        let err = OperationResultOf::<u8>::failure("boom").into_result().unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(OperationResultOf::from(3u8).into_result().unwrap(), 3);
    }

    #[test]
    fn test_display() {
        let ok = OperationResultOf::from_value("v");
        assert_eq!(ok.to_string(), "Success: true, Value: \"v\", ErrorMessage: ");

        let failed = OperationResultOf::<u8>::failure("x");
        assert_eq!(failed.to_string(), "Success: false, Value: <none>, ErrorMessage: x");
    }

    #[test]
    fn test_default_is_failure_without_message() {
        let result = OperationResultOf::<String>::default();
        assert!(result.is_failure());
        assert_eq!(result.error_message(), None);
        assert_eq!(result.into_value(), String::new());
    }
}
