//! Stream items as plain values

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;

use crate::sanitize::to_plain;

/// An item yielded by an upstream stream that the reconstructor can look at.
///
/// The wrapper only ever borrows items; the owned value is handed to the
/// caller unchanged.
pub trait StreamChunk {
    /// Plain view of the item, or `None` when there is nothing to observe.
    fn as_plain(&self) -> Option<Cow<'_, Value>>;
}

impl StreamChunk for Value {
    fn as_plain(&self) -> Option<Cow<'_, Value>> {
        Some(Cow::Borrowed(self))
    }
}

/// Typed chunks are sanitized; errors are forwarded but not observed.
impl<T: Serialize, E> StreamChunk for Result<T, E> {
    fn as_plain(&self) -> Option<Cow<'_, Value>> {
        match self {
            Ok(item) => Some(Cow::Owned(to_plain(item))),
            Err(_) => None,
        }
    }
}
