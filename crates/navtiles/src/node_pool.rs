//! Search node pool and open list
//!
//! Nodes live in a fixed-capacity pool addressed by [`NodeIndex`] and are found
//! by polygon reference through a small hash table. The open list is a binary
//! heap of node indices ordered by total cost; equal costs pop in insertion
//! order so searches are reproducible.

use super::PolyRef;

/// Node index type
pub type NodeIndex = u16;

/// Null node index
pub const NULL_IDX: NodeIndex = NodeIndex::MAX;

/// Largest pool a query may use
pub const MAX_POOL_NODES: usize = NULL_IDX as usize;

/// Node state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const OPEN: NodeFlags = NodeFlags(0x01);
    pub const CLOSED: NodeFlags = NodeFlags(0x02);

    pub fn contains(&self, flag: NodeFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: NodeFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: NodeFlags) {
        self.0 &= !flag.0;
    }
}

/// Search node
#[derive(Debug, Clone)]
pub struct Node {
    /// Position the node was reached at
    pub pos: [f32; 3],
    /// Cost from the start to the node
    pub cost: f32,
    /// Cost plus heuristic
    pub total: f32,
    /// Parent node, [`NULL_IDX`] for the start
    pub pidx: NodeIndex,
    pub flags: NodeFlags,
    /// Polygon the node stands for
    pub id: PolyRef,
}

impl Node {
    fn new(id: PolyRef) -> Self {
        Self {
            pos: [0.0; 3],
            cost: 0.0,
            total: 0.0,
            pidx: NULL_IDX,
            flags: NodeFlags::default(),
            id,
        }
    }
}

/// Fixed-capacity node storage keyed by polygon reference
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<Node>,
    first: Vec<NodeIndex>,
    next: Vec<NodeIndex>,
    max_nodes: usize,
    hash_mask: usize,
}

impl NodePool {
    /// Creates a pool; `max_nodes` is clamped to `1..=MAX_POOL_NODES`
    pub fn new(max_nodes: usize) -> Self {
        let max_nodes = max_nodes.clamp(1, MAX_POOL_NODES);
        let hash_size = (max_nodes / 4).max(1).next_power_of_two();
        Self {
            nodes: Vec::with_capacity(max_nodes),
            first: vec![NULL_IDX; hash_size],
            next: vec![NULL_IDX; max_nodes],
            max_nodes,
            hash_mask: hash_size - 1,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.first.fill(NULL_IDX);
    }

    #[inline]
    fn hash_ref(id: PolyRef) -> usize {
        let a = id.id() as usize;
        a ^ (a >> 16)
    }

    /// Returns the node of a polygon, allocating it on first use
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn get_node(&mut self, id: PolyRef) -> Option<NodeIndex> {
        if let Some(idx) = self.find_node(id) {
            return Some(idx);
        }
        if self.nodes.len() >= self.max_nodes {
            return None;
        }

        let idx = self.nodes.len();
        self.nodes.push(Node::new(id));
        let bucket = Self::hash_ref(id) & self.hash_mask;
        self.next[idx] = self.first[bucket];
        self.first[bucket] = idx as NodeIndex;
        Some(idx as NodeIndex)
    }

    /// Finds the node of a polygon without allocating
    pub fn find_node(&self, id: PolyRef) -> Option<NodeIndex> {
        let mut idx = self.first[Self::hash_ref(id) & self.hash_mask];
        while idx != NULL_IDX {
            let node = &self.nodes[idx as usize];
            if node.id == id {
                return Some(idx);
            }
            idx = self.next[idx as usize];
        }
        None
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.nodes[idx as usize]
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Polygons from the start to `idx`, following parent links
    pub fn path_to(&self, idx: NodeIndex) -> Vec<PolyRef> {
        let mut path = Vec::new();
        let mut cur = idx;
        while cur != NULL_IDX && path.len() < self.nodes.len() {
            let node = self.node(cur);
            path.push(node.id);
            cur = node.pidx;
        }
        path.reverse();
        path
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    total: f32,
    seq: u64,
    node: NodeIndex,
}

impl QueueEntry {
    #[inline]
    fn before(&self, other: &QueueEntry) -> bool {
        self.total < other.total || (self.total == other.total && self.seq < other.seq)
    }
}

/// Heap slot of a node that is not queued
const NOT_QUEUED: usize = usize::MAX;

/// Open list ordered by total cost, then insertion order
#[derive(Debug)]
pub struct NodeQueue {
    heap: Vec<QueueEntry>,
    /// Heap slot of each node index
    slots: Vec<usize>,
    capacity: usize,
    seq: u64,
}

impl NodeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            slots: vec![NOT_QUEUED; capacity],
            capacity,
            seq: 0,
        }
    }

    pub fn clear(&mut self) {
        for entry in &self.heap {
            self.slots[entry.node as usize] = NOT_QUEUED;
        }
        self.heap.clear();
        self.seq = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Adds a node; ignored when the queue is full
    pub fn push(&mut self, node: NodeIndex, total: f32) {
        if self.heap.len() >= self.capacity {
            return;
        }
        if node as usize >= self.slots.len() {
            self.slots.resize(node as usize + 1, NOT_QUEUED);
        }
        let entry = QueueEntry {
            total,
            seq: self.next_seq(),
            node,
        };
        self.heap.push(entry);
        let last = self.heap.len() - 1;
        self.bubble_up(last, entry);
    }

    /// Removes the node with the lowest total
    pub fn pop(&mut self) -> Option<NodeIndex> {
        let top = *self.heap.first()?;
        let last = self.heap.pop()?;
        self.slots[top.node as usize] = NOT_QUEUED;
        if !self.heap.is_empty() {
            self.trickle_down(0, last);
        }
        Some(top.node)
    }

    /// Updates the total of a queued node after its cost dropped
    pub fn modify(&mut self, node: NodeIndex, total: f32) {
        let Some(&i) = self.slots.get(node as usize) else {
            return;
        };
        if i == NOT_QUEUED {
            return;
        }
        let seq = self.next_seq();
        self.bubble_up(i, QueueEntry { total, seq, node });
    }

    fn bubble_up(&mut self, mut i: usize, entry: QueueEntry) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !entry.before(&self.heap[parent]) {
                break;
            }
            self.place(i, self.heap[parent]);
            i = parent;
        }
        self.place(i, entry);
    }

    fn trickle_down(&mut self, mut i: usize, entry: QueueEntry) {
        let size = self.heap.len();
        loop {
            let child1 = 2 * i + 1;
            if child1 >= size {
                break;
            }
            let child2 = child1 + 1;
            let mut min_child = child1;
            if child2 < size && self.heap[child2].before(&self.heap[child1]) {
                min_child = child2;
            }
            if !self.heap[min_child].before(&entry) {
                break;
            }
            self.place(i, self.heap[min_child]);
            i = min_child;
        }
        self.place(i, entry);
    }

    fn place(&mut self, i: usize, entry: QueueEntry) {
        self.slots[entry.node as usize] = i;
        self.heap[i] = entry;
    }
}
