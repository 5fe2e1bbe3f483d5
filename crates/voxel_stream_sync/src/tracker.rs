//! Per-entity download status.
//!
//! Every tree or chunk that has ever been asked about has a `StatusRecord` in a slab. The record remembers which request list
//! it is linked into (if any), so marking it available or releasing it unlinks it in O(1). Records are never referenced by the
//! lists directly, only by slab handle.

use crate::queue::{ListKind, ListSlot, RequestQueue};
use crate::{SyncError, SyncResult};

use voxel_stream_storage::SmallKeyHashMap;

use core::hash::Hash;
use slab::Slab;

/// Whether an entity's voxels are resident locally.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    Unavailable,
    Queued,
    Available,
}

impl Default for Status {
    fn default() -> Self {
        Status::Unavailable
    }
}

#[derive(Clone, Debug)]
struct StatusRecord<K> {
    key: K,
    status: Status,
    membership: Option<ListSlot>,
}

/// Tracks the `Status` of every entity of one kind, along with the queued and downloading lists.
///
/// Invariants:
///   - an entity is linked into at most one list
///   - an entity is linked into a list iff its status is `Queued`
#[derive(Debug)]
pub struct StatusTracker<K> {
    kind: &'static str,
    records: Slab<StatusRecord<K>>,
    index: SmallKeyHashMap<K, usize>,
    queue: RequestQueue,
    capacity: usize,
}

impl<K> StatusTracker<K>
where
    K: Clone + Eq + Hash,
{
    /// `kind` names the entities in diagnostics. At most `capacity` records can exist at once.
    pub fn new(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            records: Slab::new(),
            index: SmallKeyHashMap::default(),
            queue: RequestQueue::new(),
            capacity,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The status of `key`. Entities that were never seen are `Unavailable`. This never allocates.
    #[inline]
    pub fn status(&self, key: &K) -> Status {
        self.index
            .get(key)
            .map_or(Status::Unavailable, |h| self.records[*h].status)
    }

    /// The number of records, in any state.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn exhausted(&self) -> SyncError {
        SyncError::ResourceExhausted {
            kind: self.kind,
            capacity: self.capacity,
        }
    }

    /// Finds or creates the record for `key`.
    fn ensure_record(&mut self, key: &K) -> SyncResult<usize> {
        if let Some(handle) = self.index.get(key) {
            return Ok(*handle);
        }
        if self.records.len() >= self.capacity {
            return Err(self.exhausted());
        }
        if self.index.try_reserve(1).is_err() {
            return Err(self.exhausted());
        }
        let handle = self.records.insert(StatusRecord {
            key: key.clone(),
            status: Status::Unavailable,
            membership: None,
        });
        self.index.insert(key.clone(), handle);

        Ok(handle)
    }

    fn detach(&mut self, handle: usize) {
        if let Some(slot) = self.records[handle].membership.take() {
            self.queue.unlink(slot);
        }
    }

    /// Decides whether `key` needs downloading. A record is created on first sight. An `Unavailable` entity becomes
    /// `Available` immediately when its content is known to be `uniform`, and is queued otherwise. Returns the resulting
    /// status.
    pub fn query(&mut self, key: K, uniform: bool) -> SyncResult<Status> {
        let handle = self.ensure_record(&key)?;
        if self.records[handle].status == Status::Unavailable {
            if uniform {
                self.records[handle].status = Status::Available;
            } else {
                self.link_queued(handle);
            }
        }

        Ok(self.records[handle].status)
    }

    fn link_queued(&mut self, handle: usize) {
        let slot = self.queue.push_back(ListKind::Queued, handle);
        let record = &mut self.records[handle];
        record.membership = Some(slot);
        record.status = Status::Queued;
    }

    /// Moves an `Unavailable` entity to the back of the queue. Returns `false` if it was already queued or available.
    pub fn mark_queued(&mut self, key: K) -> SyncResult<bool> {
        let handle = self.ensure_record(&key)?;
        if self.records[handle].status != Status::Unavailable {
            return Ok(false);
        }
        self.link_queued(handle);

        Ok(true)
    }

    /// Marks `key` as resident, unlinking it from whichever list it was in. Calling this again has no further effect.
    pub fn mark_available(&mut self, key: K) -> SyncResult<()> {
        let handle = self.ensure_record(&key)?;
        self.detach(handle);
        self.records[handle].status = Status::Available;

        Ok(())
    }

    /// Forgets that `key` was ever requested or received, so it will be queried again. Does nothing for unknown entities.
    pub fn mark_unavailable_if_pruned(&mut self, key: &K) {
        if let Some(handle) = self.index.get(key).copied() {
            self.detach(handle);
            self.records[handle].status = Status::Unavailable;
        }
    }

    /// Destroys the record for `key`, unlinking it first. Call this when the entity itself is removed from the world.
    pub fn release(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(handle) => {
                self.detach(handle);
                self.records.remove(handle);

                true
            }
            None => false,
        }
    }

    /// Releases every record whose key satisfies `pred`, returning how many were released.
    pub fn release_where(&mut self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let doomed: Vec<K> = self
            .records
            .iter()
            .filter(|(_, r)| pred(&r.key))
            .map(|(_, r)| r.key.clone())
            .collect();
        for key in doomed.iter() {
            self.release(key);
        }

        doomed.len()
    }

    /// Moves the oldest queued entity into the downloading list, unless `max_downloads` are already in flight. Returns the
    /// entity that should be requested.
    pub fn begin_next_download(&mut self, max_downloads: usize) -> Option<K> {
        if self.queue.len(ListKind::Downloading) >= max_downloads {
            return None;
        }
        let (slot, handle) = self.queue.front(ListKind::Queued)?;
        self.queue.unlink(slot);
        let new_slot = self.queue.push_back(ListKind::Downloading, handle);
        let record = &mut self.records[handle];
        record.membership = Some(new_slot);

        Some(record.key.clone())
    }

    /// Accepts a response for `key`. Only entities in the downloading list are accepted; anything else is unsolicited and
    /// leaves the tracker untouched. Returns `true` iff the entity became `Available`.
    pub fn finish_download(&mut self, key: &K) -> bool {
        if !self.is_downloading(key) {
            return false;
        }
        if let Some(handle) = self.index.get(key).copied() {
            self.detach(handle);
            self.records[handle].status = Status::Available;
        }

        true
    }

    /// Returns `true` iff a request for `key` is in flight.
    pub fn is_downloading(&self, key: &K) -> bool {
        self.membership(key)
            .map_or(false, |slot| slot.list == ListKind::Downloading)
    }

    /// Returns `true` iff `key` is waiting for a download slot.
    pub fn is_queued(&self, key: &K) -> bool {
        self.membership(key)
            .map_or(false, |slot| slot.list == ListKind::Queued)
    }

    fn membership(&self, key: &K) -> Option<ListSlot> {
        self.index
            .get(key)
            .and_then(|h| self.records[*h].membership)
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len(ListKind::Queued)
    }

    pub fn downloading_len(&self) -> usize {
        self.queue.len(ListKind::Downloading)
    }

    /// Returns `true` while anything is queued or downloading.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty(ListKind::Queued) || !self.queue.is_empty(ListKind::Downloading)
    }

    /// Keys in `list`, front to back.
    pub fn keys_in(&self, list: ListKind) -> impl Iterator<Item = &K> + '_ {
        self.queue
            .iter(list)
            .map(move |handle| &self.records[handle].key)
    }

    /// Releases every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.queue.clear();
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let queued: Vec<usize> = self.queue.iter(ListKind::Queued).collect();
        let downloading: Vec<usize> = self.queue.iter(ListKind::Downloading).collect();
        for (handle, record) in self.records.iter() {
            let in_q = queued.contains(&handle);
            let in_d = downloading.contains(&handle);
            assert!(!(in_q && in_d), "record in both lists");
            assert_eq!(
                in_q || in_d,
                record.status == Status::Queued,
                "list membership must match Queued status"
            );
            assert_eq!(self.index.get(&record.key), Some(&handle));
        }
        let members = self
            .records
            .iter()
            .filter(|(_, r)| r.membership.is_some())
            .count();
        assert_eq!(queued.len() + downloading.len(), members);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use pretty_assertions::assert_eq;
    use rand::prelude::*;

    fn tracker() -> StatusTracker<u32> {
        StatusTracker::new("test", 1 << 10)
    }

    #[test]
    fn unseen_entities_are_unavailable_without_allocation() {
        let t = tracker();

        assert_eq!(t.status(&3), Status::Unavailable);
        assert!(t.is_empty());
    }

    #[test]
    fn query_queues_or_short_circuits_uniform() {
        let mut t = tracker();

        assert_eq!(t.query(1, false).unwrap(), Status::Queued);
        assert_eq!(t.query(2, true).unwrap(), Status::Available);
        assert_eq!(t.query(1, false).unwrap(), Status::Queued);
        assert_eq!(t.queued_len(), 1);
        t.assert_consistent();
    }

    #[test]
    fn mark_available_is_idempotent() {
        let mut t = tracker();
        t.mark_queued(1).unwrap();
        t.mark_queued(2).unwrap();

        t.mark_available(1).unwrap();
        t.mark_available(1).unwrap();

        assert_eq!(t.status(&1), Status::Available);
        assert_eq!(t.queued_len(), 1);
        assert_eq!(t.keys_in(ListKind::Queued).collect::<Vec<_>>(), vec![&2]);
        t.assert_consistent();
    }

    #[test]
    fn download_lifecycle() {
        let mut t = tracker();
        t.mark_queued(7).unwrap();

        assert_eq!(t.begin_next_download(1), Some(7));
        assert!(t.is_downloading(&7));
        assert_eq!(t.status(&7), Status::Queued);
        t.assert_consistent();

        assert!(t.finish_download(&7));
        assert_eq!(t.status(&7), Status::Available);
        assert!(!t.has_pending());
        assert!(!t.finish_download(&7));
    }

    #[test]
    fn unsolicited_finish_changes_nothing() {
        let mut t = tracker();
        t.mark_queued(1).unwrap();

        assert!(!t.finish_download(&1));
        assert!(!t.finish_download(&99));
        assert_eq!(t.status(&1), Status::Queued);
        assert_eq!(t.status(&99), Status::Unavailable);
        assert!(t.is_queued(&1));
        t.assert_consistent();
    }

    #[test]
    fn downloads_are_bounded_and_fifo() {
        let mut t = tracker();
        for k in 0..7 {
            t.mark_queued(k).unwrap();
        }
        let started: Vec<u32> = std::iter::from_fn(|| t.begin_next_download(5)).collect();

        assert_eq!(started, vec![0, 1, 2, 3, 4]);
        assert_eq!(t.downloading_len(), 5);
        assert_eq!(t.queued_len(), 2);

        assert!(t.finish_download(&2));
        assert_eq!(t.begin_next_download(5), Some(5));
        assert_eq!(t.begin_next_download(5), None);
        assert_eq!(t.queued_len(), 1);
        t.assert_consistent();
    }

    #[test]
    fn pruning_and_release_detach_records() {
        let mut t = tracker();
        t.mark_queued(1).unwrap();
        t.mark_queued(2).unwrap();
        t.begin_next_download(5);

        t.mark_unavailable_if_pruned(&1);
        assert_eq!(t.status(&1), Status::Unavailable);
        assert_eq!(t.downloading_len(), 0);

        assert!(t.release(&2));
        assert!(!t.release(&2));
        assert_eq!(t.queued_len(), 0);
        assert_eq!(t.len(), 1);
        t.assert_consistent();

        assert_eq!(t.release_where(|k| *k == 1), 1);
        assert!(t.is_empty());
    }

    #[test]
    fn capacity_is_a_hard_error() {
        let mut t = StatusTracker::new("test", 2);
        t.mark_queued(1u32).unwrap();
        t.mark_queued(2).unwrap();

        assert!(matches!(
            t.mark_queued(3),
            Err(SyncError::ResourceExhausted { capacity: 2, .. })
        ));
        // Known entities still work at capacity.
        assert!(t.mark_available(1).is_ok());
    }

    #[test]
    fn random_event_sequences_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut t = tracker();
        let max = 5;

        for _ in 0..2000 {
            let key = rng.gen_range(0..40);
            let before = t.status(&key);
            match rng.gen_range(0..5) {
                0 => {
                    t.query(key, rng.gen_bool(0.2)).unwrap();
                }
                1 => {
                    t.begin_next_download(max);
                }
                2 => {
                    t.finish_download(&key);
                }
                3 => {
                    if t.is_queued(&key) || t.is_downloading(&key) {
                        t.mark_available(key).unwrap();
                    }
                }
                _ => {
                    t.mark_queued(key).unwrap();
                }
            }
            let after = t.status(&key);
            let legal = matches!(
                (before, after),
                (Status::Unavailable, _)
                    | (Status::Queued, Status::Queued)
                    | (Status::Queued, Status::Available)
                    | (Status::Available, Status::Available)
            );
            assert!(legal, "illegal transition {:?} -> {:?}", before, after);
            assert!(t.downloading_len() <= max);
            t.assert_consistent();
        }
    }
}
