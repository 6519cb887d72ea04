//! Rendering of caught panic payloads for log output.

use std::{any::Any, fmt};

/// A caught panic payload that displays as its message.
///
/// `panic!` payloads are usually a `String` or a `&'static str`; anything else
/// is shown through its `Debug` form.
///
/// ```
/// use tickwire::panic::format_panic;
///
/// assert_eq!(format_panic(Box::new("callback exploded")).to_string(), "callback exploded");
/// assert_eq!(format_panic(Box::new(String::from("owned"))).to_string(), "owned");
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// The payload text, if it was a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => f.write_str(text),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Wrap a payload returned by [`std::panic::catch_unwind`].
pub fn format_panic(payload: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(payload) }
