// exposed API of the registry

use self::future::*;
use super::{
    error::*,
    core::{self, Commit, Shards},
    slot::{Slot, Outcome, Timeout},
};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
    time::{Duration, Instant},
};


/// Configuration for constructing a [`Registry`]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegistryConfig {
    /// Number of independently locked shards
    ///
    /// Must be a power of two no greater than 65536. Zero selects the default of 256.
    pub shard_count: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig { shard_count: core::DEFAULT_SHARD_COUNT }
    }
}

impl RegistryConfig {
    /// Ownership-chaining setter for [`shard_count`](Self::shard_count)
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Construct a registry with this configuration
    pub fn build<T, E>(&self) -> Result<Registry<T, E>, InvalidShardCountError> {
        let shard_count = match self.shard_count {
            0 => core::DEFAULT_SHARD_COUNT,
            n if n.is_power_of_two() && n <= core::MAX_SHARD_COUNT => n,
            shard_count => return Err(InvalidShardCountError { shard_count }),
        };
        Ok(Registry(Arc::new(Shards::new(shard_count))))
    }
}


/// Table of outstanding requests, keyed by correlation ID
///
/// `T` is the answer value and `E` is the error a producer may answer with. Cloning a `Registry`
/// produces another handle to the same table.
///
/// Keys are spread over a fixed number of independently locked shards, so that operations on
/// unrelated keys almost never contend with each other.
pub struct Registry<T, E>(Arc<Shards<T, E>>);

impl<T, E> Registry<T, E> {
    /// Construct with the default shard count of 256
    pub fn new() -> Self {
        Registry(Arc::new(Shards::new(core::DEFAULT_SHARD_COUNT)))
    }

    /// Construct with the given shard count
    ///
    /// Errors if `shard_count` is not a power of two or is greater than 65536. Zero selects the
    /// default.
    pub fn with_shard_count(shard_count: usize) -> Result<Self, InvalidShardCountError> {
        RegistryConfig { shard_count }.build()
    }

    /// Number of shards this registry was constructed with
    pub fn shard_count(&self) -> usize {
        self.0.count()
    }

    /// Number of outstanding keys
    ///
    /// Shards are counted one at a time, so this is not an atomic snapshot when other threads
    /// are using the registry concurrently.
    pub fn pending(&self) -> usize {
        self.0.len()
    }

    /// Apply for a request with the given key
    ///
    /// Returns `None` if the key already has an outstanding request, in which case the existing
    /// request is left untouched. Otherwise, returns the only handle through which the answer can
    /// be waited for.
    pub fn apply(&self, key: impl Into<String>) -> Option<Req<T, E>> {
        let key = key.into();
        let shard = self.0.shard_of(&key);
        let Some(slot) = self.0.lock(shard).insert(&key) else {
            trace!(%key, "key already has an outstanding request");
            return None;
        };
        trace!(%key, shard, "applied for request");
        Some(Req {
            shards: Arc::clone(&self.0),
            shard,
            key,
            slot,
            consumed: AtomicBool::new(false),
        })
    }

    /// Answer the request with the given key
    ///
    /// Wakes the waiter with the result. If the key has no outstanding request, or its request
    /// already has an answer (including a timeout), this does nothing: the first answer wins and
    /// the producer is not told whether anyone was listening.
    pub fn answer(&self, key: &str, result: Result<T, E>) {
        let outcome = result.map_err(WaitError::Answered);
        match self.0.lock(self.0.shard_of(key)).commit_key(key, outcome) {
            Commit::Committed => trace!(%key, "answered request"),
            Commit::NoSlot => trace!(%key, "answer for key with no outstanding request, ignoring"),
            Commit::AlreadyResolved => trace!(%key, "request already resolved, ignoring answer"),
        }
    }
}

impl<T, E> Default for Registry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Registry<T, E> {
    fn clone(&self) -> Self {
        Registry(Arc::clone(&self.0))
    }
}

impl<T, E> fmt::Debug for Registry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Registry")
            .field("shard_count", &self.shard_count())
            .finish_non_exhaustive()
    }
}


/// Handle to an outstanding request, returned by [`Registry::apply`]
///
/// Exactly one of [`wait_answer`](Self::wait_answer), [`wait_answer_async`](Self::wait_answer_async)
/// or [`delete`](Self::delete) takes effect: whichever is called first. Dropping a `Req` on which
/// none of them was called deletes it.
pub struct Req<T, E> {
    shards: Arc<Shards<T, E>>,
    shard: usize,
    key: String,
    slot: Arc<Slot<T, E>>,
    // set by the first call to wait or delete.
    consumed: AtomicBool,
}

impl<T, E> Req<T, E> {
    /// The key this request was applied for
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block until the request is answered or the timeout elapses
    ///
    /// A zero timeout waits forever. If the timeout elapses first, resolves to
    /// [`WaitError::DeadlineExceeded`], unless an answer lands while the deadline is being
    /// committed, in which case the answer wins. Either way the key is freed when this returns.
    ///
    /// Only the first wait on a handle does anything. Any later wait, or a wait after
    /// [`delete`](Self::delete), immediately returns [`WaitError::RepetitionCall`].
    pub fn wait_answer(&self, timeout: Duration) -> Result<T, WaitError<E>> {
        if !self.claim() {
            return Err(RepetitionCallError.into());
        }
        let timeout = match Instant::now().checked_add(timeout) {
            Some(deadline) if !timeout.is_zero() => Timeout::At(deadline),
            _ => Timeout::Never,
        };
        if !self.slot.block(timeout) {
            self.expire();
        }
        self.finish()
    }

    /// Create a future which waits for the request to be answered or the timeout to elapse
    ///
    /// Behaves like [`wait_answer`](Self::wait_answer), except that rather than blocking it
    /// resolves asynchronously. The timeout is driven by tokio's timer, so the future must be
    /// polled inside a tokio runtime with the time driver enabled.
    ///
    /// The handle counts as waited on as soon as this is called. If the future is dropped before
    /// it resolves, the request is abandoned and its key freed.
    pub fn wait_answer_async(&self, timeout: Duration) -> WaitFut<'_, T, E> {
        if !self.claim() {
            return WaitFut::repeated(self);
        }
        let deadline = tokio::time::Instant::now().checked_add(timeout)
            .filter(|_| !timeout.is_zero());
        WaitFut::waiting(self, deadline)
    }

    /// Cancel interest in the request, freeing its key
    ///
    /// Has no effect once a wait has begun, or if already deleted.
    pub fn delete(&self) {
        if self.claim() {
            self.shards.lock(self.shard).remove(&self.key, &self.slot);
            trace!(key = %self.key, "deleted request");
        }
    }

    // flip the consumed flag. returns whether this call was the one to flip it.
    fn claim(&self) -> bool {
        self.consumed.compare_exchange(false, true, Relaxed, Relaxed).is_ok()
    }

    // commit the deadline exceeded error, unless an answer got there first.
    fn expire(&self) {
        let lock = self.shards.lock(self.shard);
        if lock.commit(&self.slot, Err(DeadlineExceededError.into())) {
            trace!(key = %self.key, "request deadline exceeded");
        }
    }

    // free the key and take the outcome. the slot must be resolved.
    fn finish(&self) -> Outcome<T, E> {
        self.shards.lock(self.shard).remove(&self.key, &self.slot);
        self.slot.take()
    }

    // free the key without taking the outcome.
    fn abandon(&self) {
        self.shards.lock(self.shard).remove(&self.key, &self.slot);
        trace!(key = %self.key, "abandoned request wait");
    }
}

impl<T, E> fmt::Debug for Req<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Req")
            .field("key", &self.key)
            .field("consumed", &self.consumed.load(Relaxed))
            .field("resolved", &self.slot.is_resolved())
            .finish_non_exhaustive()
    }
}

impl<T, E> Drop for Req<T, E> {
    fn drop(&mut self) {
        // to make sure the key is freed if nothing was ever called
        self.delete();
    }
}


// future types for requests.
pub(crate) mod future {
    use super::*;
    use std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    };
    use tokio::time::{Sleep, sleep_until};

    /// Future for waiting on a [`Req`], created by [`Req::wait_answer_async`]
    ///
    /// Resolves exactly once. Polling again after it resolved returns `Poll::Pending` forever.
    ///
    /// Dropping this future before it resolves abandons the request: its key is freed, and the
    /// handle cannot be waited on again.
    pub struct WaitFut<'a, T, E> {
        req: &'a Req<T, E>,
        state: State,
    }

    enum State {
        // the handle was already waited on or deleted.
        Repeated,
        // waiting on the slot, and on the timer if there is a deadline. the timer is only
        // created on first poll so that constructing the future does not need a runtime.
        Waiting {
            deadline: Option<tokio::time::Instant>,
            sleep: Option<Pin<Box<Sleep>>>,
        },
        // resolved.
        Terminated,
    }

    impl<'a, T, E> WaitFut<'a, T, E> {
        pub(super) fn repeated(req: &'a Req<T, E>) -> Self {
            WaitFut { req, state: State::Repeated }
        }

        pub(super) fn waiting(req: &'a Req<T, E>, deadline: Option<tokio::time::Instant>) -> Self {
            WaitFut { req, state: State::Waiting { deadline, sleep: None } }
        }

        /// Whether this future has already resolved
        pub fn is_terminated(&self) -> bool {
            matches!(self.state, State::Terminated)
        }
    }

    impl<'a, T, E> Future for WaitFut<'a, T, E> {
        type Output = Result<T, WaitError<E>>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
            let this = self.get_mut();
            // none if repeated, otherwise whether the deadline elapsed
            let expired = match &mut this.state {
                // for implementation of FusedFuture
                State::Terminated => return Poll::Pending,
                State::Repeated => None,
                State::Waiting { deadline, sleep } => {
                    if this.req.slot.poll_resolved(cx) {
                        Some(false)
                    } else if let &mut Some(deadline) = deadline {
                        let sleep = sleep.get_or_insert_with(|| Box::pin(sleep_until(deadline)));
                        if sleep.as_mut().poll(cx).is_pending() {
                            return Poll::Pending;
                        }
                        Some(true)
                    } else {
                        return Poll::Pending;
                    }
                }
            };
            // dropping the waiting state drops the timer
            this.state = State::Terminated;
            match expired {
                None => Poll::Ready(Err(RepetitionCallError.into())),
                Some(expired) => {
                    if expired {
                        this.req.expire();
                    }
                    Poll::Ready(this.req.finish())
                }
            }
        }
    }

    #[cfg(feature = "futures")]
    impl<'a, T, E> futures::future::FusedFuture for WaitFut<'a, T, E> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }

    impl<'a, T, E> Drop for WaitFut<'a, T, E> {
        fn drop(&mut self) {
            if let State::Waiting { .. } = self.state {
                self.req.abandon();
            }
        }
    }
}


// ==== tests ====
