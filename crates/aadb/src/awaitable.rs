//! Awaitable results of instrumented driver calls.
//!
//! Two flavours share one type, selected by [`AwaitMode`]:
//!
//! - [`AwaitMode::Lazy`] (default): nothing happens until the awaitable is first
//!   polled. An awaitable that is built but never awaited never reaches the driver.
//! - [`AwaitMode::Eager`]: the driver call starts when the awaitable is built.
//!   Dropping it without awaiting is fine; the result is discarded.

use crate::error::{AdapterError, AdapterResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = AdapterResult<T>> + Send>>;
type Executor<T> = Box<dyn FnOnce() -> BoxFuture<T> + Send>;

/// When the underlying driver call of an [`Awaitable`] starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AwaitMode {
    /// Start on first poll. Single use, no buffering.
    #[default]
    Lazy,
    /// Start immediately on construction.
    Eager,
}

impl AwaitMode {
    /// `true` maps to [`AwaitMode::Eager`].
    pub fn from_use_promise(use_promise: bool) -> Self {
        if use_promise {
            Self::Eager
        } else {
            Self::Lazy
        }
    }
}

enum State<T> {
    Pending(Executor<T>),
    Running(BoxFuture<T>),
    Done,
}

/// A future resolving to the result delivered by a driver completion.
#[must_use = "a lazy awaitable does nothing unless awaited"]
pub struct Awaitable<T> {
    state: State<T>,
}

impl<T> Awaitable<T> {
    pub(crate) fn new<F>(mode: AwaitMode, executor: F) -> Self
    where
        F: FnOnce() -> BoxFuture<T> + Send + 'static,
    {
        let state = match mode {
            AwaitMode::Lazy => State::Pending(Box::new(executor)),
            AwaitMode::Eager => State::Running(executor()),
        };
        Self { state }
    }

    /// An awaitable that is already settled.
    pub fn ready(result: AdapterResult<T>) -> Self
    where
        T: Send + 'static,
    {
        let fut: BoxFuture<T> = Box::pin(std::future::ready(result));
        Self {
            state: State::Running(fut),
        }
    }

    /// Whether the underlying call has been started.
    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::Pending(_))
    }
}

impl<T> Future for Awaitable<T> {
    type Output = AdapterResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Pending(executor) => this.state = State::Running(executor()),
                State::Running(mut fut) => {
                    return match fut.as_mut().poll(cx) {
                        Poll::Ready(result) => Poll::Ready(result),
                        Poll::Pending => {
                            this.state = State::Running(fut);
                            Poll::Pending
                        }
                    };
                }
                State::Done => panic!("Awaitable polled after completion"),
            }
        }
    }
}

impl<T> fmt::Debug for Awaitable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Pending(_) => "pending",
            State::Running(_) => "running",
            State::Done => "done",
        };
        f.debug_struct("Awaitable").field("state", &state).finish()
    }
}

pub(crate) fn rejected<T: Send + 'static>(err: AdapterError) -> BoxFuture<T> {
    Box::pin(std::future::ready(Err(err)))
}

/// Settle-once handle shared by a completion and the synchronous error path.
pub(crate) struct Settle<T> {
    tx: Arc<Mutex<Option<oneshot::Sender<AdapterResult<T>>>>>,
}

impl<T> Clone for Settle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Settle<T> {
    /// Create a settle handle and the future that observes it.
    ///
    /// If every clone of the handle is dropped unsettled, the future rejects with
    /// [`AdapterError::CompletionDropped`].
    pub(crate) fn channel(
        method: impl Into<String>,
    ) -> (Self, impl Future<Output = AdapterResult<T>> + Send + 'static)
    where
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let method = method.into();
        let settle = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        let fut = async move {
            rx.await
                .unwrap_or_else(|_| Err(AdapterError::CompletionDropped(method)))
        };
        (settle, fut)
    }

    /// Settle with `result`. Only the first call has an effect.
    pub(crate) fn settle(&self, result: AdapterResult<T>) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            // The consumer may have dropped an eager awaitable.
            let _ = tx.send(result);
        }
    }

    pub(crate) fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub(crate) fn reject(&self, err: AdapterError) {
        self.settle(Err(err));
    }
}
