//! Entry storage: every key/value pair lives in one arena slot and is linked
//! into its bucket by stable `NodeKey`s rather than by owning pointers.
//!
//! A chain entry only uses `next`. A tree entry additionally uses the
//! `TreeLinks` (`prev` for the doubly linked bucket order, `parent`/`left`/
//! `right`/`color` for the red-black tree). Chain entries always carry
//! `TreeLinks::default()`.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable arena index of an entry.
    pub(crate) struct NodeKey;
}

pub(crate) type Arena<K, V> = SlotMap<NodeKey, Node<K, V>>;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    #[default]
    Black,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct TreeLinks {
    pub(crate) prev: Option<NodeKey>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    pub(crate) color: Color,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<NodeKey>,
    pub(crate) tree: TreeLinks,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V) -> Self {
        Self {
            hash,
            key,
            value,
            next: None,
            tree: TreeLinks::default(),
        }
    }
}

/// Per-slot representation. The head of a `Tree` bucket's order list is
/// always its root.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    Chain { head: NodeKey, len: usize },
    Tree { root: NodeKey, len: usize },
}

impl Bucket {
    /// First entry in bucket order, if any.
    #[inline]
    pub(crate) fn head(self) -> Option<NodeKey> {
        match self {
            Bucket::Empty => None,
            Bucket::Chain { head, .. } => Some(head),
            Bucket::Tree { root, .. } => Some(root),
        }
    }

    #[inline]
    pub(crate) fn len(self) -> usize {
        match self {
            Bucket::Empty => 0,
            Bucket::Chain { len, .. } | Bucket::Tree { len, .. } => len,
        }
    }
}

/// Accumulates entries at the tail of a bucket-order list while splitting.
/// `doubly` also maintains `prev` links (tree buckets).
#[derive(Debug)]
pub(crate) struct OrderList {
    pub(crate) head: Option<NodeKey>,
    tail: Option<NodeKey>,
    pub(crate) len: usize,
    doubly: bool,
}

impl OrderList {
    pub(crate) fn new(doubly: bool) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            doubly,
        }
    }

    pub(crate) fn push<K, V>(&mut self, nodes: &mut Arena<K, V>, x: NodeKey) {
        nodes[x].next = None;
        if self.doubly {
            nodes[x].tree.prev = self.tail;
        }
        match self.tail {
            None => self.head = Some(x),
            Some(t) => nodes[t].next = Some(x),
        }
        self.tail = Some(x);
        self.len += 1;
    }
}

/// Walk a bucket-order list starting at `head`.
pub(crate) fn walk<K, V>(nodes: &Arena<K, V>, head: Option<NodeKey>) -> impl Iterator<Item = NodeKey> + '_ {
    let mut cur = head;
    core::iter::from_fn(move || {
        let k = cur?;
        cur = nodes[k].next;
        Some(k)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_list_appends_and_links_prev_when_doubly() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let keys: Vec<NodeKey> = (0..4).map(|i| nodes.insert(Node::new(i, i, i))).collect();

        let mut single = OrderList::new(false);
        single.push(&mut nodes, keys[0]);
        single.push(&mut nodes, keys[2]);
        assert_eq!(single.len, 2);
        let order: Vec<NodeKey> = walk(&nodes, single.head).collect();
        assert_eq!(order, vec![keys[0], keys[2]]);
        assert_eq!(nodes[keys[2]].tree.prev, None);

        let mut double = OrderList::new(true);
        double.push(&mut nodes, keys[1]);
        double.push(&mut nodes, keys[3]);
        assert_eq!(nodes[keys[3]].tree.prev, Some(keys[1]));
        assert_eq!(nodes[keys[1]].tree.prev, None);
        assert_eq!(nodes[keys[3]].next, None);
    }

    #[test]
    fn bucket_head_and_len() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let k = nodes.insert(Node::new(1, 1, 1));
        assert_eq!(Bucket::Empty.head(), None);
        assert_eq!(Bucket::Empty.len(), 0);
        assert_eq!(Bucket::Chain { head: k, len: 3 }.head(), Some(k));
        assert_eq!(Bucket::Tree { root: k, len: 9 }.len(), 9);
    }
}
