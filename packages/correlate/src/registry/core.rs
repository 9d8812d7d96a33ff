// minimal sharded key -> slot table. the exposed API is a convenience wrapper around this.

use super::slot::{Slot, Outcome};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};


// shard count used when none is configured.
pub(crate) const DEFAULT_SHARD_COUNT: usize = 1 << 8;
// largest permitted shard count.
pub(crate) const MAX_SHARD_COUNT: usize = 1 << 16;

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

// 32-bit fnv-1a. stable across runs, uniform enough for spreading keys over shards.
pub(crate) fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ byte as u32).wrapping_mul(FNV_PRIME))
}

// a shard's key -> slot map.
type SlotMap<T, E> = HashMap<String, Arc<Slot<T, E>>>;

// array of independently locked shards.
pub(crate) struct Shards<T, E> {
    shards: Box<[Mutex<SlotMap<T, E>>]>,
    // shard count - 1.
    mask: u32,
}

impl<T, E> Shards<T, E> {
    // construct with the given number of empty shards.
    //
    // panics if count is not a power of two or exceeds MAX_SHARD_COUNT.
    pub(crate) fn new(count: usize) -> Self {
        assert!(count.is_power_of_two() && count <= MAX_SHARD_COUNT, "invalid shard count");
        Shards {
            shards: (0..count).map(|_| Mutex::new(HashMap::new())).collect(),
            mask: (count - 1) as u32,
        }
    }

    // number of shards.
    pub(crate) fn count(&self) -> usize {
        self.shards.len()
    }

    // index of the shard that owns the key.
    pub(crate) fn shard_of(&self, key: &str) -> usize {
        (fnv1a(key.as_bytes()) & self.mask) as usize
    }

    // lock the shard with the given index.
    pub(crate) fn lock(&self, shard: usize) -> Lock<'_, T, E> {
        Lock(self.shards[shard].lock().unwrap())
    }

    // total number of outstanding keys, summed one shard at a time.
    pub(crate) fn len(&self) -> usize {
        (0..self.count()).map(|shard| self.lock(shard).0.len()).sum()
    }
}

// lock on a shard.
pub(crate) struct Lock<'a, T, E>(MutexGuard<'a, SlotMap<T, E>>);

impl<'a, T, E> Lock<'a, T, E> {
    // create and insert a fresh pending slot for the key.
    //
    // returns none if the key already has a slot.
    pub(crate) fn insert(&mut self, key: &str) -> Option<Arc<Slot<T, E>>> {
        if self.0.contains_key(key) {
            return None;
        }
        let slot = Arc::new(Slot::new());
        self.0.insert(key.to_owned(), Arc::clone(&slot));
        Some(slot)
    }

    // commit an outcome to the key's slot, if the key has a slot which is still pending.
    pub(crate) fn commit_key(&self, key: &str, outcome: Outcome<T, E>) -> Commit {
        match self.0.get(key) {
            None => Commit::NoSlot,
            Some(slot) if slot.commit(outcome) => Commit::Committed,
            Some(_) => Commit::AlreadyResolved,
        }
    }

    // commit an outcome to the given slot, if it is still pending.
    //
    // the slot must belong to this shard.
    pub(crate) fn commit(&self, slot: &Slot<T, E>, outcome: Outcome<T, E>) -> bool {
        slot.commit(outcome)
    }

    // remove the key, but only if it still maps to the given slot.
    pub(crate) fn remove(&mut self, key: &str, slot: &Arc<Slot<T, E>>) -> bool {
        if self.0.get(key).is_some_and(|present| Arc::ptr_eq(present, slot)) {
            self.0.remove(key);
            true
        } else {
            false
        }
    }
}

// result of committing by key.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Commit {
    // the outcome was committed and the waiter woken.
    Committed,
    // the key has no outstanding slot.
    NoSlot,
    // the key's slot already has an outcome.
    AlreadyResolved,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeadlineExceededError;

    #[test]
    fn fnv1a_test_vectors() {
        assert_eq!(fnv1a(b""), 0x811c9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn shard_of_is_masked_and_stable() {
        let shards = Shards::<(), ()>::new(16);
        for i in 0..1000 {
            let key = format!("key-{}", i);
            let shard = shards.shard_of(&key);
            assert!(shard < 16);
            assert_eq!(shard, shards.shard_of(&key));
            assert_eq!(shard, (fnv1a(key.as_bytes()) % 16) as usize);
        }
    }

    #[test]
    fn keys_spread_over_shards() {
        let shards = Shards::<(), ()>::new(256);
        let mut hits = [0usize; 256];
        for i in 0..25_600 {
            hits[shards.shard_of(&format!("req-{}", i))] += 1;
        }
        // every shard gets traffic, none gets a wildly disproportionate share
        assert!(hits.iter().all(|&n| n > 0 && n < 400), "{:?}", hits);
    }

    #[test]
    fn single_shard() {
        let shards = Shards::<(), ()>::new(1);
        assert_eq!(shards.shard_of("a"), 0);
        assert_eq!(shards.shard_of("anything else"), 0);
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_panics() {
        Shards::<(), ()>::new(12);
    }

    #[test]
    fn insert_remove() {
        let shards = Shards::<u8, ()>::new(4);
        let shard = shards.shard_of("k");
        let slot = shards.lock(shard).insert("k").unwrap();
        assert!(shards.lock(shard).insert("k").is_none());
        assert_eq!(shards.len(), 1);

        // a different slot under the same key is not removed
        let other = Arc::new(Slot::new());
        assert!(!shards.lock(shard).remove("k", &other));
        assert!(shards.lock(shard).remove("k", &slot));
        assert!(!shards.lock(shard).remove("k", &slot));
        assert_eq!(shards.len(), 0);
        assert!(shards.lock(shard).insert("k").is_some());
    }

    #[test]
    fn commit_key() {
        let shards = Shards::<u8, ()>::new(4);
        let shard = shards.shard_of("k");
        assert_eq!(shards.lock(shard).commit_key("k", Ok(1)), Commit::NoSlot);
        let slot = shards.lock(shard).insert("k").unwrap();
        assert_eq!(shards.lock(shard).commit_key("k", Ok(2)), Commit::Committed);
        assert_eq!(shards.lock(shard).commit_key("k", Ok(3)), Commit::AlreadyResolved);
        assert!(!shards.lock(shard).commit(&slot, Err(DeadlineExceededError.into())));
        assert_eq!(slot.take(), Ok(2));
    }
}
