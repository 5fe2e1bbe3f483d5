/// Doubly-linked list using Vec as storage.
///
/// Every inserted value is addressed by the `usize` index returned from `push_front` or `push_back`. That index stays valid
/// until the value is removed, so a value can be unlinked in O(1) by whoever holds its index, without searching the list.
#[derive(Clone, Debug)]
pub struct IndexList<T> {
    entries: Vec<ListEntry<T>>,
    len: usize,
}

#[derive(Clone, Debug)]
struct ListEntry<T> {
    value: Option<T>,
    next: usize,
    prev: usize,
}

impl<T> Default for IndexList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Free and occupied cells are each linked into a cyclic list with one auxiliary cell.
/// Cell #0 is on the list of free cells, element #1 is on the list of occupied cells.
impl<T> IndexList<T> {
    const FREE: usize = 0;
    const OCCUPIED: usize = 1;

    pub fn new() -> IndexList<T> {
        let mut list = IndexList {
            entries: Vec::with_capacity(2),
            len: 0,
        };
        list.push_sentinels();

        list
    }

    fn push_sentinels(&mut self) {
        self.entries.push(ListEntry::<T> {
            value: None,
            next: Self::FREE,
            prev: Self::FREE,
        });
        self.entries.push(ListEntry::<T> {
            value: None,
            next: Self::OCCUPIED,
            prev: Self::OCCUPIED,
        });
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.entries[index].prev;
        let next = self.entries[index].next;
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    fn link_after(&mut self, index: usize, prev: usize) {
        let next = self.entries[prev].next;
        self.entries[index].prev = prev;
        self.entries[index].next = next;
        self.entries[prev].next = index;
        self.entries[next].prev = index;
    }

    fn alloc(&mut self, value: T) -> usize {
        if self.entries[Self::FREE].next == Self::FREE {
            self.entries.push(ListEntry::<T> {
                value: None,
                next: Self::FREE,
                prev: Self::FREE,
            });
            self.entries[Self::FREE].next = self.entries.len() - 1;
        }
        let index = self.entries[Self::FREE].next;
        self.entries[index].value = Some(value);
        self.unlink(index);
        self.len += 1;

        index
    }

    /// Inserts `value` at the front, returning the index that addresses it.
    pub fn push_front(&mut self, value: T) -> usize {
        let index = self.alloc(value);
        self.link_after(index, Self::OCCUPIED);

        index
    }

    /// Inserts `value` at the back, returning the index that addresses it.
    pub fn push_back(&mut self, value: T) -> usize {
        let index = self.alloc(value);
        let last = self.entries[Self::OCCUPIED].prev;
        self.link_after(index, last);

        index
    }

    pub fn move_to_front(&mut self, index: usize) {
        if self.contains_index(index) {
            self.unlink(index);
            self.link_after(index, Self::OCCUPIED);
        }
    }

    /// Returns `true` iff `index` currently addresses a value.
    pub fn contains_index(&self, index: usize) -> bool {
        index > Self::OCCUPIED
            && self
                .entries
                .get(index)
                .map_or(false, |e| e.value.is_some())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index <= Self::OCCUPIED {
            return None;
        }

        self.entries.get(index).and_then(|e| e.value.as_ref())
    }

    /// Unlinks the value at `index`. Returns `None` if `index` is not occupied.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if !self.contains_index(index) {
            return None;
        }

        self.unlink(index);
        self.link_after(index, Self::FREE);
        self.len -= 1;

        self.entries[index].value.take()
    }

    pub fn front(&self) -> Option<usize> {
        let index = self.entries[Self::OCCUPIED].next;

        (index != Self::OCCUPIED).then(|| index)
    }

    pub fn back(&self) -> Option<usize> {
        let index = self.entries[Self::OCCUPIED].prev;

        (index != Self::OCCUPIED).then(|| index)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.front().and_then(|index| self.remove(index))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.back().and_then(|index| self.remove(index))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate from front to back.
    pub fn iter(&self) -> IndexListIter<'_, T> {
        IndexListIter {
            list: self,
            cursor: self.entries[Self::OCCUPIED].next,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
        self.push_sentinels();
    }
}

pub struct IndexListIter<'a, T> {
    list: &'a IndexList<T>,
    cursor: usize,
}

impl<'a, T> Iterator for IndexListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == IndexList::<T>::OCCUPIED {
            return None;
        }
        let entry = &self.list.entries[self.cursor];
        self.cursor = entry.next;

        entry.value.as_ref()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
