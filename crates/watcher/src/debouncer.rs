//! Debouncing of repeated calls
//!
//! A [`Debouncer`] wraps a handler so that a burst of calls arriving within
//! the debounce window results in a single handler invocation, using the
//! arguments of the last call. Earlier calls in the burst settle explicitly as
//! [`Settlement::Superseded`] instead of being left hanging, and a handler
//! that panics settles as [`Settlement::Failed`].

use futures::FutureExt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// Outcome of a single debounced call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<R> {
    /// The window elapsed with no newer call and the handler ran
    Completed(R),
    /// A newer call replaced this one before the window elapsed
    Superseded,
    /// The handler ran and panicked
    Failed,
}

impl<R> Settlement<R> {
    /// Check if the call was superseded
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    /// Handler output, if the handler ran
    pub fn into_completed(self) -> Option<R> {
        match self {
            Self::Completed(output) => Some(output),
            Self::Superseded | Self::Failed => None,
        }
    }
}

/// The single pending-action slot
struct PendingSlot {
    token: CancellationToken,
    generation: u64,
}

#[derive(Default)]
struct DebounceState {
    pending: Option<PendingSlot>,
    next_generation: u64,
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    // The state is a plain slot; a panic elsewhere cannot leave it half-written.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Coalesces rapid calls into one delayed handler invocation per window
pub struct Debouncer<A, F> {
    window: Duration,
    handler: Arc<F>,
    state: Arc<Mutex<DebounceState>>,
    _args: PhantomData<fn(A)>,
}

impl<A, F, Fut> Debouncer<A, F>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    /// Wrap `handler` with a cooling-off window of `window`
    pub fn new(window: Duration, handler: F) -> Self {
        Self {
            window,
            handler: Arc::new(handler),
            state: Arc::new(Mutex::new(DebounceState::default())),
            _args: PhantomData,
        }
    }

    /// Schedule `handler(args)` after the window, replacing any pending call
    ///
    /// Must be called from within a tokio runtime.
    pub fn call(&self, args: A) -> DebouncedCall<Fut::Output> {
        let token = CancellationToken::new();

        let generation = {
            let mut state = lock(&self.state);
            if let Some(previous) = state.pending.take() {
                trace!("Superseding pending call #{}", previous.generation);
                previous.token.cancel();
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            state.pending = Some(PendingSlot {
                token: token.clone(),
                generation,
            });
            generation
        };

        let (tx, rx) = oneshot::channel();
        let handler = Arc::clone(&self.handler);
        let state = Arc::clone(&self.state);
        let window = self.window;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    let _ = tx.send(Settlement::Superseded);
                }
                _ = sleep(window) => {
                    {
                        let mut state = lock(&state);
                        if state
                            .pending
                            .as_ref()
                            .is_some_and(|slot| slot.generation == generation)
                        {
                            state.pending = None;
                        }
                    }
                    trace!("Debounce window elapsed for call #{generation}");
                    // Once started the handler runs to completion; later calls
                    // only affect the next window.
                    let settlement = match AssertUnwindSafe(async move { handler(args).await })
                        .catch_unwind()
                        .await
                    {
                        Ok(output) => Settlement::Completed(output),
                        Err(_) => {
                            error!("Debounced handler for call #{generation} panicked");
                            Settlement::Failed
                        }
                    };
                    let _ = tx.send(settlement);
                }
            }
        });

        DebouncedCall { rx }
    }
}

impl<A, F> Debouncer<A, F> {
    /// The configured window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a call is waiting for its window to elapse
    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Drop the pending call, if any. It settles as superseded.
    pub fn cancel(&self) {
        if let Some(slot) = lock(&self.state).pending.take() {
            slot.token.cancel();
        }
    }
}

impl<A, F> std::fmt::Debug for Debouncer<A, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Future returned by [`Debouncer::call`]
#[derive(Debug)]
#[must_use = "a debounced call does nothing observable unless awaited"]
pub struct DebouncedCall<R> {
    rx: oneshot::Receiver<Settlement<R>>,
}

impl<R> Future for DebouncedCall<R> {
    type Output = Settlement<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the timer task was torn down without running.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Settlement::Superseded))
    }
}
