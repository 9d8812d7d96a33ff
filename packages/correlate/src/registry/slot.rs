// per-key one-shot completion slot.
//
// design based on the mutex + condvar signal of the pollster crate, reduced to a single
// transition from pending to resolved.

use super::error::WaitError;
use std::{
    sync::{Condvar, Mutex},
    task::{Context, Waker},
    time::Instant,
};


// the eventual result of a slot.
pub(crate) type Outcome<T, E> = Result<T, WaitError<E>>;

// how long to block waiting for a slot to resolve.
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
}

// slot state.
//
// only ever moves forward: Pending -> Resolved -> Taken.
enum State<T, E> {
    // nothing committed yet. holds the waker of an async waiter, if one has polled.
    Pending(Option<Waker>),
    // an outcome was committed and the waiter has not yet taken it.
    Resolved(Outcome<T, E>),
    // the waiter took the outcome.
    Taken,
}

// one-shot completion object for a single outstanding key.
pub(crate) struct Slot<T, E> {
    state: Mutex<State<T, E>>,
    cond: Condvar,
}

impl<T, E> Slot<T, E> {
    // construct pending, armed for exactly one commit.
    pub(crate) fn new() -> Self {
        Slot {
            state: Mutex::new(State::Pending(None)),
            cond: Condvar::new(),
        }
    }

    // commit an outcome and wake the waiter, if nothing has been committed yet.
    //
    // returns false and drops the outcome if the slot was already resolved. callers must hold the
    // lock of the shard that owns this slot, which is what makes the first committer win.
    pub(crate) fn commit(&self, outcome: Outcome<T, E>) -> bool {
        let mut lock = self.state.lock().unwrap();
        let State::Pending(waker) = &mut *lock else { return false };
        let waker = waker.take();
        *lock = State::Resolved(outcome);
        drop(lock);

        self.cond.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    // whether an outcome has been committed, taken or not.
    pub(crate) fn is_resolved(&self) -> bool {
        !matches!(&*self.state.lock().unwrap(), State::Pending(_))
    }

    // block until resolved or the timeout is reached, in which case return false.
    //
    // a false return does not stop a commit from landing afterwards.
    pub(crate) fn block(&self, timeout: Timeout) -> bool {
        let mut lock = self.state.lock().unwrap();
        match timeout {
            // block on mutex + condvar indefinitely
            Timeout::Never =>
                while let State::Pending(_) = &*lock {
                    lock = self.cond.wait(lock).unwrap();
                },

            // block on mutex + condvar until deadline, at which point return false
            Timeout::At(deadline) =>
                while let State::Pending(_) = &*lock {
                    let Some(duration) =
                        deadline.checked_duration_since(Instant::now())
                        .filter(|duration| !duration.is_zero())
                        else { return false };
                    lock = self.cond.wait_timeout(lock, duration).unwrap().0;
                },
        }
        true
    }

    // return whether resolved. if not, install a waker from the context to be woken by the commit.
    pub(crate) fn poll_resolved(&self, cx: &mut Context) -> bool {
        let mut lock = self.state.lock().unwrap();
        let State::Pending(waker) = &mut *lock else { return true };
        if !waker.as_ref().is_some_and(|waker| waker.will_wake(cx.waker())) {
            *waker = Some(cx.waker().clone());
        }
        false
    }

    // take the committed outcome.
    //
    // panics if not resolved or already taken.
    pub(crate) fn take(&self) -> Outcome<T, E> {
        let mut lock = self.state.lock().unwrap();
        match std::mem::replace(&mut *lock, State::Taken) {
            State::Resolved(outcome) => outcome,
            State::Pending(_) => panic!("slot taken before resolving (internal bug)"),
            State::Taken => panic!("slot taken twice (internal bug)"),
        }
    }
}
