//! Failure isolation
//!
//! Every instrumentation step (prompt normalization, extraction, stream
//! reconstruction) runs through [`isolate`]. An `Err` or a panic inside the
//! step is logged at error level and turned into `None`, so nothing raised
//! by the recorder ever reaches the wrapped call's caller. Sink deliveries
//! get the same treatment in [`crate::sink::Dispatcher`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::Result;

/// Run `f`, absorbing its error or panic.
///
/// `context` is the fixed prefix logged on failure, e.g.
/// `"could not record streamed response"`.
///
/// Panics are caught but the process-wide panic hook still runs first, so
/// with the default hook a caught panic is also printed to stderr. Install a
/// custom hook with [`std::panic::set_hook`] to silence it.
pub fn isolate<T, F>(context: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "{}", context);
            None
        }
        Err(payload) => {
            tracing::error!(panic_message = %panic_message(&payload), "{}", context);
            None
        }
    }
}

pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use tracing_test::traced_test;

    #[test]
    fn passes_values_through() {
        assert_eq!(isolate("unused", || Ok(7)), Some(7));
    }

    #[traced_test]
    #[test]
    fn errors_become_none_and_are_logged() {
        let out: Option<()> = isolate("could not extract response", || {
            Err(RecorderError::Extraction("no choices".into()))
        });
        assert!(out.is_none());
        assert!(logs_contain("could not extract response"));
        assert!(logs_contain("no choices"));
    }

    #[traced_test]
    #[test]
    fn panics_become_none_and_are_logged() {
        let out: Option<u8> = isolate("could not record streamed response", || {
            panic!("accumulator blew up")
        });
        assert!(out.is_none());
        assert!(logs_contain("accumulator blew up"));
    }
}
