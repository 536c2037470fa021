//! Single-use completion slot
//!
//! Every asynchronous operation in the session layer resolves through a
//! [`Completion`]: the first `resolve` delivers the value, any later attempt
//! is refused with `IndivoError::DoubleCompletion` and logged at error level.

use indivo_domain::IndivoError;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::error;

/// Sending half of a one-shot result
#[derive(Debug)]
pub struct Completion<T> {
    label: String,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    /// Create a slot and the receiver its value is delivered to
    ///
    /// `label` names the operation in logs and errors.
    pub fn new(label: impl Into<String>) -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { label: label.into(), sender: Mutex::new(Some(tx)) }, rx)
    }

    /// Deliver `value`
    ///
    /// A dropped receiver still counts as resolved.
    ///
    /// # Errors
    /// Returns `IndivoError::DoubleCompletion` if already resolved
    pub fn resolve(&self, value: T) -> Result<(), IndivoError> {
        let sender = self.sender.lock().take();
        match sender {
            Some(tx) => {
                // Receiver gone means nobody is waiting anymore.
                let _ = tx.send(value);
                Ok(())
            }
            None => {
                error!(operation = %self.label, "Completion resolved more than once");
                Err(IndivoError::DoubleCompletion(self.label.clone()))
            }
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }
}
