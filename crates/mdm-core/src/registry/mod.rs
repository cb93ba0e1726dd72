//! Download registry: the ordered, doubly linked list of records plus one
//! selection cursor per filter mode.
//!
//! Nodes live in a map keyed by [`RecordId`]; `prev`/`next` are ids, so the
//! registry is the only owner of every record. Cursors are plain ids and are
//! repaired whenever the record they point at is removed or leaves the
//! cursor's mode.

mod selection;


use std::collections::HashMap;

use crate::record::{DownloadRecord, RecordId};

pub use selection::{FilterMode, Selection};

#[derive(Debug)]
struct Node {
    record: DownloadRecord,
    prev: Option<RecordId>,
    next: Option<RecordId>,
}

#[derive(Debug, Default)]
pub struct Registry {
    nodes: HashMap<RecordId, Node>,
    head: Option<RecordId>,
    tail: Option<RecordId>,
    last_id: u64,
    selection: Selection,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a record about to be appended.
    pub fn allocate_id(&mut self) -> RecordId {
        self.last_id += 1;
        RecordId::new(self.last_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn head(&self) -> Option<RecordId> {
        self.head
    }

    pub fn tail(&self) -> Option<RecordId> {
        self.tail
    }

    pub fn get(&self, id: RecordId) -> Option<&DownloadRecord> {
        self.nodes.get(&id).map(|n| &n.record)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut DownloadRecord> {
        self.nodes.get_mut(&id).map(|n| &mut n.record)
    }

    pub fn next_of(&self, id: RecordId) -> Option<RecordId> {
        self.nodes.get(&id).and_then(|n| n.next)
    }

    pub fn prev_of(&self, id: RecordId) -> Option<RecordId> {
        self.nodes.get(&id).and_then(|n| n.prev)
    }

    /// True if a live record was created from this raw locator.
    pub fn contains_locator(&self, raw: &str) -> bool {
        self.nodes
            .values()
            .any(|n| n.record.locator().raw() == raw)
    }

    /// Appends `record` at the tail. The record's id must come from
    /// [`Registry::allocate_id`].
    pub fn append(&mut self, record: DownloadRecord) -> RecordId {
        let id = record.id();
        let prev = self.tail;
        if let Some(tail) = prev.and_then(|t| self.nodes.get_mut(&t)) {
            tail.next = Some(id);
        }
        self.nodes.insert(
            id,
            Node {
                record,
                prev,
                next: None,
            },
        );
        if self.head.is_none() {
            self.head = Some(id);
        }
        self.tail = Some(id);
        id
    }

    /// Unlinks and returns a record. Cursors that pointed at it move to the
    /// nearest record matching their mode: forward first, then backward.
    pub fn remove(&mut self, id: RecordId) -> Option<DownloadRecord> {
        let (prev, next) = {
            let node = self.nodes.get(&id)?;
            (node.prev, node.next)
        };
        let orphaned = self.selection.modes_at(id);

        match prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(&p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes.get_mut(&n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        let node = self.nodes.remove(&id)?;

        for mode in orphaned {
            let seat = self.nearest(next, prev, mode);
            self.selection.set(mode, seat);
        }
        Some(node.record)
    }

    /// Forward-then-backward nearest-match search, starting at `forward`
    /// (inclusive) and then at `backward` (inclusive).
    fn nearest(
        &self,
        forward: Option<RecordId>,
        backward: Option<RecordId>,
        mode: FilterMode,
    ) -> Option<RecordId> {
        let matches = |r: &DownloadRecord| mode.matches(r.state());
        forward
            .and_then(|f| self.scan_from(f, Direction::Forward, &matches))
            .or_else(|| backward.and_then(|b| self.scan_from(b, Direction::Backward, &matches)))
    }

    /// Re-seats every cursor that points at a record no longer matching its
    /// mode. Called after any state change.
    pub fn repair_selection(&mut self) {
        for mode in FilterMode::ALL {
            let Some(id) = self.selection.get(mode) else {
                continue;
            };
            let seat = match self.nodes.get(&id) {
                Some(node) if mode.matches(node.record.state()) => continue,
                Some(node) => self.nearest(node.next, node.prev, mode),
                None => None,
            };
            self.selection.set(mode, seat);
        }
    }

    pub fn selected(&self, mode: FilterMode) -> Option<RecordId> {
        self.selection.get(mode)
    }

    /// Points `mode`'s cursor at `id`. Ignored if `id` is not live or does
    /// not match the mode.
    pub fn select(&mut self, mode: FilterMode, id: Option<RecordId>) {
        match id {
            Some(id) => {
                if self.get(id).is_some_and(|r| mode.matches(r.state())) {
                    self.selection.set(mode, Some(id));
                }
            }
            None => self.selection.set(mode, None),
        }
    }

    /// First record strictly after `from` satisfying `pred`; from the head
    /// when `from` is `None`.
    pub fn find_next<P>(&self, from: Option<RecordId>, pred: P) -> Option<RecordId>
    where
        P: Fn(&DownloadRecord) -> bool,
    {
        let start = match from {
            Some(id) => self.next_of(id)?,
            None => self.head?,
        };
        self.scan_from(start, Direction::Forward, &pred)
    }

    /// First record strictly before `from` satisfying `pred`; from the tail
    /// when `from` is `None`.
    pub fn find_prev<P>(&self, from: Option<RecordId>, pred: P) -> Option<RecordId>
    where
        P: Fn(&DownloadRecord) -> bool,
    {
        let start = match from {
            Some(id) => self.prev_of(id)?,
            None => self.tail?,
        };
        self.scan_from(start, Direction::Backward, &pred)
    }

    fn scan_from<P>(&self, start: RecordId, dir: Direction, pred: &P) -> Option<RecordId>
    where
        P: Fn(&DownloadRecord) -> bool,
    {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let node = self.nodes.get(&id)?;
            if pred(&node.record) {
                return Some(id);
            }
            cur = match dir {
                Direction::Forward => node.next,
                Direction::Backward => node.prev,
            };
        }
        None
    }

    /// Records in list order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            registry: self,
            cur: self.head,
        }
    }

    /// Ids in list order, for callers that mutate while walking.
    pub fn ids(&self) -> Vec<RecordId> {
        self.iter().map(|r| r.id()).collect()
    }

    /// Checks the doubly linked chain: head/tail ends, `next.prev == self`,
    /// and that every node is reachable from the head.
    pub fn check_links(&self) -> Result<(), String> {
        let Some(head) = self.head else {
            return if self.tail.is_none() && self.nodes.is_empty() {
                Ok(())
            } else {
                Err("empty head with live nodes or tail".to_string())
            };
        };
        if self.nodes.get(&head).and_then(|n| n.prev).is_some() {
            return Err(format!("head {} has a prev link", head));
        }
        let mut seen = 0usize;
        let mut cur = head;
        loop {
            let node = self
                .nodes
                .get(&cur)
                .ok_or_else(|| format!("dangling link to {}", cur))?;
            seen += 1;
            if seen > self.nodes.len() {
                return Err("cycle in chain".to_string());
            }
            match node.next {
                Some(next) => {
                    let back = self.nodes.get(&next).and_then(|n| n.prev);
                    if back != Some(cur) {
                        return Err(format!("{}.next.prev is not {}", cur, cur));
                    }
                    cur = next;
                }
                None => break,
            }
        }
        if self.tail != Some(cur) {
            return Err(format!("tail is not the last node {}", cur));
        }
        if seen != self.nodes.len() {
            return Err(format!("{} of {} nodes reachable", seen, self.nodes.len()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

pub struct Iter<'a> {
    registry: &'a Registry,
    cur: Option<RecordId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a DownloadRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.registry.nodes.get(&self.cur?)?;
        self.cur = node.next;
        Some(&node.record)
    }
}
