//! # Deferred Request Adapter
//!
//! Turns one engine request (open, read, write) into a future.
//!
//! ```text
//!   engine side                         caller side
//!  ┌───────────┐   resolve / reject   ┌─────────────┐
//!  │  Settler  │ ───────────────────→ │  Deferred   │  .await → Result<T, EngineError>
//!  └───────────┘                      └─────────────┘
//!        │ rejector()                        │ rejector()
//!        ▼                                   ▼
//!  ┌──────────────────────────────────────────────┐
//!  │ Rejector (Clone): force-fail from outside,    │
//!  │ e.g. when the engine reports "blocked"        │
//!  └──────────────────────────────────────────────┘
//! ```
//!
//! Exactly one resolution wins. Later attempts hand their value back to the
//! caller so an engine can release whatever it was about to deliver.

use crate::domain::errors::EngineError;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Outcome<T> = Result<T, EngineError>;
type Slot<T> = Arc<Mutex<Option<oneshot::Sender<Outcome<T>>>>>;

/// Create a linked settler/future pair.
pub fn pair<T>() -> (Settler<T>, Deferred<T>) {
    let (tx, rx) = oneshot::channel();
    let slot = Arc::new(Mutex::new(Some(tx)));
    (
        Settler { slot: slot.clone() },
        Deferred { rx, slot },
    )
}

/// A future that is already settled.
pub fn ready<T>(outcome: Outcome<T>) -> Deferred<T> {
    let (settler, deferred) = pair();
    // A fresh pair cannot already be settled.
    let _ = settler.settle(outcome);
    deferred
}

/// Engine-side handle that settles a `Deferred`.
///
/// Dropping it unsettled rejects the future with `EngineError::Abandoned`.
pub struct Settler<T> {
    slot: Slot<T>,
}

impl<T> Settler<T> {
    /// Settle with `outcome`. Returns it back if the future was already settled.
    pub fn settle(self, outcome: Outcome<T>) -> Result<(), Outcome<T>> {
        let sender = self.slot.lock().take();
        match sender {
            Some(tx) => tx.send(outcome),
            None => Err(outcome),
        }
    }

    /// Resolve with `value`. Returns the value if the future lost the race.
    pub fn resolve(self, value: T) -> Result<(), T> {
        match self.settle(Ok(value)) {
            Ok(()) => Ok(()),
            Err(Ok(value)) => Err(value),
            // settle hands back exactly what it was given.
            Err(Err(_)) => Ok(()),
        }
    }

    /// Reject with `err`. Returns `false` if already settled.
    pub fn reject(self, err: EngineError) -> bool {
        self.settle(Err(err)).is_ok()
    }

    /// A cloneable trigger that can force-fail the future.
    pub fn rejector(&self) -> Rejector<T> {
        Rejector {
            slot: self.slot.clone(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T> Drop for Settler<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.slot.lock().take() {
            let _ = tx.send(Err(EngineError::Abandoned));
        }
    }
}

/// Force-fails a pending request.
pub struct Rejector<T> {
    slot: Slot<T>,
}

impl<T> Clone for Rejector<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Rejector<T> {
    /// Reject the request. Returns `false` if it had already settled.
    pub fn reject(&self, err: EngineError) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(Err(err)).is_ok(),
            None => false,
        }
    }
}

/// Caller-side future of an engine request.
pub struct Deferred<T> {
    rx: oneshot::Receiver<Outcome<T>>,
    slot: Slot<T>,
}

impl<T> Deferred<T> {
    /// Same trigger as `Settler::rejector`.
    pub fn rejector(&self) -> Rejector<T> {
        Rejector {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(EngineError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
