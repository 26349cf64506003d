//! Access-order tracking for O(1) LRU eviction.
//!
//! A doubly linked list addressed by slot index instead of pointers: nodes
//! live in a `Vec`, freed slots are recycled through a free list, and the
//! head is the most recently touched key.

/// Slot handle returned by [`RecencyIndex::push_front`].
pub type SlotId = usize;

#[derive(Debug)]
struct Node {
    key: String,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

#[derive(Debug, Default)]
pub struct RecencyIndex {
    nodes: Vec<Option<Node>>,
    free: Vec<SlotId>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl RecencyIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `key` as most recently used and return its slot.
    pub fn push_front(&mut self, key: String) -> SlotId {
        let node = Node {
            key,
            prev: None,
            next: self.head,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.attach_front(slot);
        self.len += 1;
        slot
    }

    /// Mark `slot` as most recently used.
    pub fn touch(&mut self, slot: SlotId) {
        if self.head == Some(slot) || !self.is_live(slot) {
            return;
        }
        self.detach(slot);
        self.attach_front(slot);
    }

    /// Remove `slot` and return its key.
    pub fn remove(&mut self, slot: SlotId) -> Option<String> {
        if !self.is_live(slot) {
            return None;
        }
        self.detach(slot);
        let node = self.nodes[slot].take()?;
        self.free.push(slot);
        self.len -= 1;
        Some(node.key)
    }

    /// Remove and return the least recently used key.
    pub fn pop_back(&mut self) -> Option<String> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Keys from most to least recently used.
    pub fn iter(&self) -> RecencyIter<'_> {
        RecencyIter {
            index: self,
            cursor: self.head,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn is_live(&self, slot: SlotId) -> bool {
        matches!(self.nodes.get(slot), Some(Some(_)))
    }

    fn attach_front(&mut self, slot: SlotId) {
        let old_head = self.head;
        if let Some(node) = self.nodes[slot].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(node) = self.nodes[h].as_mut() {
                    node.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn detach(&mut self, slot: SlotId) {
        let (prev, next) = match self.nodes[slot].as_mut() {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

/// Iterator over keys in MRU → LRU order.
pub struct RecencyIter<'a> {
    index: &'a RecencyIndex,
    cursor: Option<SlotId>,
}

impl<'a> Iterator for RecencyIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.index.nodes[slot].as_ref()?;
        self.cursor = node.next;
        Some(node.key.as_str())
    }
}
