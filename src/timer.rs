//! Idle-connection timers, kept sorted by expiration.
//!
//! The list is an arena of timer records linked by slot indices rather than
//! pointers. A [`TimerHandle`] carries the slot index plus a generation
//! counter; freeing a slot bumps the generation, so a stale handle is
//! rejected instead of touching a record that now belongs to someone else.
//!
//! The list is not synchronized. It belongs to the dispatcher thread and must
//! stay there.

use std::time::Instant;

/// Stable reference to a live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    index: usize,
    generation: u64,
}

struct Record {
    expires: Instant,
    token: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot {
    generation: u64,
    record: Option<Record>,
}

/// Ascending-sorted collection of per-connection expirations.
pub struct TimerList {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl TimerList {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a timer expiring at `expires`, carrying an opaque connection
    /// `token` handed back on eviction. O(1) when the new deadline is earlier
    /// than every existing one, O(n) otherwise.
    pub fn add(&mut self, expires: Instant, token: u64) -> TimerHandle {
        let index = self.alloc(Record {
            expires,
            token,
            prev: None,
            next: None,
        });
        self.link_from(index, self.head);
        self.len += 1;
        TimerHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Extends a timer's deadline. The new deadline must not be earlier than
    /// the old one; the search for the new position starts at the timer's
    /// old successor, since nothing before it can have become later.
    ///
    /// Returns `false` if the handle is stale.
    pub fn adjust(&mut self, handle: TimerHandle, expires: Instant) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        if expires < self.record(handle.index).expires {
            return false;
        }
        let successor = self.record(handle.index).next;
        self.unlink(handle.index);
        self.record_mut(handle.index).expires = expires;
        self.link_from(handle.index, successor);
        true
    }

    /// Unlinks and frees a timer. O(1). Returns `false` if the handle is
    /// stale (already evicted or removed).
    pub fn remove(&mut self, handle: TimerHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.unlink(handle.index);
        self.release(handle.index);
        true
    }

    /// Evicts every timer with `expires <= now`, in ascending order, calling
    /// `evict` with each timer's token. Stops at the first live deadline:
    /// the list is sorted, so nothing behind it can have expired.
    pub fn tick<F: FnMut(u64)>(&mut self, now: Instant, mut evict: F) {
        while let Some(index) = self.head {
            let record = self.record(index);
            if now < record.expires {
                break;
            }
            let token = record.token;
            self.unlink(index);
            self.release(index);
            evict(token);
        }
    }

    /// Tokens in expiration order. Used by diagnostics and tests.
    pub fn tokens(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let record = self.record(index);
            out.push(record.token);
            cursor = record.next;
        }
        out
    }

    fn is_live(&self, handle: TimerHandle) -> bool {
        self.slots
            .get(handle.index)
            .is_some_and(|slot| slot.generation == handle.generation && slot.record.is_some())
    }

    /// Panics if `index` names a freed slot; internal links never do.
    fn record(&self, index: usize) -> &Record {
        match self.slots[index].record.as_ref() {
            Some(record) => record,
            None => unreachable!("timer link points at a freed slot"),
        }
    }

    fn record_mut(&mut self, index: usize) -> &mut Record {
        match self.slots[index].record.as_mut() {
            Some(record) => record,
            None => unreachable!("timer link points at a freed slot"),
        }
    }

    fn alloc(&mut self, record: Record) -> usize {
        if let Some(index) = self.free.pop() {
            self.slots[index].record = Some(record);
            index
        } else {
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            self.slots.len() - 1
        }
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.record = None;
        slot.generation += 1;
        self.free.push(index);
        self.len -= 1;
    }

    /// Walks forward from `start` (or appends at the tail when `start` is
    /// `None`) and splices `index` in just before the first later deadline.
    fn link_from(&mut self, index: usize, start: Option<usize>) {
        let expires = self.record(index).expires;
        let mut cursor = start;
        while let Some(at) = cursor {
            if expires < self.record(at).expires {
                break;
            }
            cursor = self.record(at).next;
        }
        match cursor {
            Some(at) => self.link_before(index, at),
            None => self.link_tail(index),
        }
    }

    fn link_before(&mut self, index: usize, at: usize) {
        let prev = self.record(at).prev;
        {
            let record = self.record_mut(index);
            record.prev = prev;
            record.next = Some(at);
        }
        self.record_mut(at).prev = Some(index);
        match prev {
            Some(p) => self.record_mut(p).next = Some(index),
            None => self.head = Some(index),
        }
    }

    fn link_tail(&mut self, index: usize) {
        let old_tail = self.tail;
        {
            let record = self.record_mut(index);
            record.prev = old_tail;
            record.next = None;
        }
        match old_tail {
            Some(t) => self.record_mut(t).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let record = self.record(index);
            (record.prev, record.next)
        };
        match prev {
            Some(p) => self.record_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.record_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let record = self.record_mut(index);
        record.prev = None;
        record.next = None;
    }
}

impl Default for TimerList {
    fn default() -> Self {
        Self::new()
    }
}
