use voxel_stream_storage::IndexList;

/// The two lists an entity can wait in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ListKind {
    /// Waiting for a download slot.
    Queued,
    /// A request has been sent and no response has been accepted yet.
    Downloading,
}

/// A membership token: which list a record is linked into, and where.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ListSlot {
    pub list: ListKind,
    pub index: usize,
}

/// FIFO request lists over record handles. A handle can only be unlinked through the `ListSlot` returned when it was pushed,
/// which is O(1).
#[derive(Debug, Default)]
pub struct RequestQueue {
    queued: IndexList<usize>,
    downloading: IndexList<usize>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, list: ListKind) -> &IndexList<usize> {
        match list {
            ListKind::Queued => &self.queued,
            ListKind::Downloading => &self.downloading,
        }
    }

    fn list_mut(&mut self, list: ListKind) -> &mut IndexList<usize> {
        match list {
            ListKind::Queued => &mut self.queued,
            ListKind::Downloading => &mut self.downloading,
        }
    }

    /// Appends `handle` to the back of `list`.
    pub fn push_back(&mut self, list: ListKind, handle: usize) -> ListSlot {
        let index = self.list_mut(list).push_back(handle);

        ListSlot { list, index }
    }

    /// Unlinks whatever `slot` points at, returning its handle.
    pub fn unlink(&mut self, slot: ListSlot) -> Option<usize> {
        self.list_mut(slot.list).remove(slot.index)
    }

    /// The handle at the front of `list`, without unlinking it.
    pub fn front(&self, list: ListKind) -> Option<(ListSlot, usize)> {
        let l = self.list(list);
        let index = l.front()?;

        l.get(index).map(|handle| (ListSlot { list, index }, *handle))
    }

    pub fn len(&self, list: ListKind) -> usize {
        self.list(list).len()
    }

    pub fn is_empty(&self, list: ListKind) -> bool {
        self.list(list).is_empty()
    }

    /// Handles in `list`, front to back.
    pub fn iter(&self, list: ListKind) -> impl Iterator<Item = usize> + '_ {
        self.list(list).iter().copied()
    }

    pub fn clear(&mut self) {
        self.queued.clear();
        self.downloading.clear();
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

    #[test]
    fn slots_unlink_from_their_own_list() {
        let mut q = RequestQueue::new();
        let a = q.push_back(ListKind::Queued, 10);
        let b = q.push_back(ListKind::Downloading, 20);
        q.push_back(ListKind::Queued, 30);

        assert_eq!(q.unlink(a), Some(10));
        assert_eq!(q.unlink(b), Some(20));
        assert_eq!(q.iter(ListKind::Queued).collect::<Vec<_>>(), vec![30]);
        assert!(q.is_empty(ListKind::Downloading));
    }

    #[test]
    fn front_is_oldest() {
        let mut q = RequestQueue::new();
        q.push_back(ListKind::Queued, 1);
        q.push_back(ListKind::Queued, 2);

        let (slot, handle) = q.front(ListKind::Queued).unwrap();
        assert_eq!(handle, 1);
        assert_eq!(q.unlink(slot), Some(1));
        assert_eq!(q.front(ListKind::Queued).map(|(_, h)| h), Some(2));
    }
}
