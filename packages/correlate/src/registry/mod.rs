// implementation of the correlation registry.
//
// the architecture is as such:
//
// registry handles wrap around Arc<Shards>
//                                  |
//          /-----------------------/
//          v
//       shards: a fixed, power-of-two sized array of Mutex<HashMap<key, Arc<Slot>>>
//          |
//          |------ a key selects its shard by hashing it with fnv-1a and masking the hash with
//          |       shard count - 1. unrelated keys almost always land in different shards and
//          |       never contend on the same mutex.
//          |
//          \------ each outstanding key maps to a slot. the slot is shared between the shard
//                  (so the producer can find it by key) and exactly one Req handle (so the
//                  waiter can block on it). no one else ever holds a slot.
//
// a slot has its own small mutex and condvar, which are the one-shot wake signal. the lock order
// is always shard then slot. the blocking waiter only ever holds the slot mutex while asleep, so
// producers never block behind a sleeping waiter.
//
// committing an outcome to a slot requires holding its shard's lock. both the producer's answer
// and the waiter's deadline go through that single commit path, and a commit on a slot that is no
// longer pending is refused. thus whichever of them takes the shard lock first is authoritative,
// and the wake signal fires at most once.
//
// the organization of these modules is as such:
//
//      slot<-----------core: owns the shard array and the key -> slot maps. panicky but simple.
//                      ^
//                      |
//                      api: Registry and Req, the exposed API. adapts core into first-call-wins
//                           handles with blocking and async waits. the crate re-exports it.
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod slot;
mod core;
