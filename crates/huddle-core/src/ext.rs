use huddle_shared::{ChatError, ChatResult};
use huddle_store::StoreError;

/// Attach a subject to store lookups so a missing row reads as
/// "Not found: chat 1234" instead of a generic message.
pub(crate) trait OrNotFound<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> ChatResult<T>;
}

impl<T> OrNotFound<T> for Result<T, StoreError> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> ChatResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(StoreError::NotFound) => Err(ChatError::NotFound(what())),
            Err(other) => Err(other.into()),
        }
    }
}
