//! Cancellable asynchronous requests.
//!
//! A provider hands back a [`PendingRequest`] immediately and resolves it
//! later through the paired [`Responder`], from any thread. The traversal
//! thread only ever calls [`PendingRequest::poll`], which never blocks.
//!
//! ```text
//!   traversal thread                       provider / worker thread
//!   ────────────────                       ────────────────────────
//!   let (req, resp) = channel() ─────────► resp.respond(result)
//!   req.poll() → Pending                        │
//!   req.poll() → Ready(result) ◄────────────────┘
//!   req.cancel() ──── token ───────────────► resp.is_cancelled()
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::FetchError;

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  /// Request cancellation. Idempotent.
  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  /// True once [`CancelToken::cancel`] has been called.
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

/// Consumer side of an in-flight request.
pub struct PendingRequest<T> {
  receiver: Receiver<Result<T, FetchError>>,
  token: CancelToken,
}

/// Producer side of an in-flight request.
pub struct Responder<T> {
  sender: Sender<Result<T, FetchError>>,
  token: CancelToken,
}

impl<T> PendingRequest<T> {
  /// Create a request and the responder that resolves it.
  pub fn channel() -> (Self, Responder<T>) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let token = CancelToken::default();
    (
      Self {
        receiver,
        token: token.clone(),
      },
      Responder { sender, token },
    )
  }

  /// A request that is already resolved.
  pub fn ready(result: Result<T, FetchError>) -> Self {
    let (request, responder) = Self::channel();
    responder.respond(result);
    request
  }

  /// Check for a result without blocking.
  pub fn poll(&self) -> Poll<Result<T, FetchError>> {
    if self.token.is_cancelled() {
      return Poll::Ready(Err(FetchError::Cancelled));
    }
    match self.receiver.try_recv() {
      Ok(result) => Poll::Ready(result),
      Err(TryRecvError::Empty) => Poll::Pending,
      Err(TryRecvError::Disconnected) => Poll::Ready(Err(FetchError::Disconnected)),
    }
  }

  /// Cancel the request. Idempotent; later polls report `Cancelled`.
  pub fn cancel(&self) {
    self.token.cancel();
  }

  /// Token observed by the responder.
  pub fn token(&self) -> &CancelToken {
    &self.token
  }
}

impl<T> Responder<T> {
  /// Resolve the request. Dropped silently if it was cancelled.
  pub fn respond(self, result: Result<T, FetchError>) {
    if self.token.is_cancelled() {
      return;
    }
    // The consumer may already be gone; nothing to deliver then.
    let _ = self.sender.try_send(result);
  }

  /// True when the consumer cancelled; the work can be skipped.
  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pending_until_responded() {
    let (request, responder) = PendingRequest::<u32>::channel();
    assert!(request.poll().is_pending());
    responder.respond(Ok(7));
    assert_eq!(request.poll(), Poll::Ready(Ok(7)));
  }

  #[test]
  fn test_dropped_responder_disconnects() {
    let (request, responder) = PendingRequest::<u32>::channel();
    drop(responder);
    assert_eq!(request.poll(), Poll::Ready(Err(FetchError::Disconnected)));
  }

  #[test]
  fn test_cancel_is_idempotent() {
    let (request, responder) = PendingRequest::<u32>::channel();
    request.cancel();
    request.cancel();
    assert!(responder.is_cancelled());
    responder.respond(Ok(1));
    assert_eq!(request.poll(), Poll::Ready(Err(FetchError::Cancelled)));
  }

  #[test]
  fn test_ready_request() {
    let request = PendingRequest::ready(Err::<u32, _>(FetchError::Provider("404".into())));
    assert_eq!(
      request.poll(),
      Poll::Ready(Err(FetchError::Provider("404".into())))
    );
  }
}
