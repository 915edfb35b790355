//! Red-black tree buckets.
//!
//! A tree bucket's entries form a red-black tree ordered by hash, then by
//! the optional natural key order, then by arena identity. The same entries
//! also form a doubly linked order list (`next` / `tree.prev`) whose head is
//! kept equal to the tree root, so the table slot can hold a single key for
//! both. All functions here take the current root and return the new one;
//! the caller stores it back into the bucket.

use core::cmp::Ordering;

use crate::error::InvariantViolation;
use crate::node::{Arena, Color, NodeKey, OrderList, TreeLinks};

/// Optional total order on keys, consulted between hash and identity.
pub(crate) type KeyOrder<K> = Option<fn(&K, &K) -> Ordering>;

#[inline]
fn is_red<K, V>(nodes: &Arena<K, V>, x: Option<NodeKey>) -> bool {
    matches!(x, Some(x) if nodes[x].tree.color == Color::Red)
}

#[inline]
fn parent<K, V>(nodes: &Arena<K, V>, x: NodeKey) -> Option<NodeKey> {
    nodes[x].tree.parent
}

/// Replace `old` by `new` among `pp`'s children, or report `new` as the root.
#[inline]
fn replace_child<K, V>(
    nodes: &mut Arena<K, V>,
    root: &mut NodeKey,
    pp: Option<NodeKey>,
    old: NodeKey,
    new: NodeKey,
) {
    match pp {
        None => *root = new,
        Some(pp) if nodes[pp].tree.left == Some(old) => nodes[pp].tree.left = Some(new),
        Some(pp) => nodes[pp].tree.right = Some(new),
    }
}

/// Placement order used when linking `x` under the tree: hash, then the
/// natural order if configured, then identity. Never `Equal` for `x != p`.
fn placement<K, V>(nodes: &Arena<K, V>, order: KeyOrder<K>, x: NodeKey, p: NodeKey) -> Ordering {
    let (xn, pn) = (&nodes[x], &nodes[p]);
    xn.hash
        .cmp(&pn.hash)
        .then_with(|| order.map_or(Ordering::Equal, |cmp| cmp(&xn.key, &pn.key)))
        .then_with(|| x.cmp(&p))
}

pub(crate) fn rotate_left<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(r) = nodes[p].tree.right else {
        return root;
    };
    let rl = nodes[r].tree.left;
    nodes[p].tree.right = rl;
    if let Some(rl) = rl {
        nodes[rl].tree.parent = Some(p);
    }
    let pp = nodes[p].tree.parent;
    nodes[r].tree.parent = pp;
    if pp.is_none() {
        nodes[r].tree.color = Color::Black;
    }
    replace_child(nodes, &mut root, pp, p, r);
    nodes[r].tree.left = Some(p);
    nodes[p].tree.parent = Some(r);
    root
}

pub(crate) fn rotate_right<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(l) = nodes[p].tree.left else {
        return root;
    };
    let lr = nodes[l].tree.right;
    nodes[p].tree.left = lr;
    if let Some(lr) = lr {
        nodes[lr].tree.parent = Some(p);
    }
    let pp = nodes[p].tree.parent;
    nodes[l].tree.parent = pp;
    if pp.is_none() {
        nodes[l].tree.color = Color::Black;
    }
    replace_child(nodes, &mut root, pp, p, l);
    nodes[l].tree.right = Some(p);
    nodes[p].tree.parent = Some(l);
    root
}

/// Restore the red-black properties after `x` was linked in as a leaf.
pub(crate) fn balance_insertion<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
    nodes[x].tree.color = Color::Red;
    loop {
        let Some(xp) = parent(nodes, x) else {
            nodes[x].tree.color = Color::Black;
            return x;
        };
        if !is_red(nodes, Some(xp)) {
            return root;
        }
        let Some(xpp) = parent(nodes, xp) else {
            return root;
        };
        let xppl = nodes[xpp].tree.left;
        let xppr = nodes[xpp].tree.right;
        if Some(xp) == xppl {
            if let Some(uncle) = xppr.filter(|&u| is_red(nodes, Some(u))) {
                nodes[uncle].tree.color = Color::Black;
                nodes[xp].tree.color = Color::Black;
                nodes[xpp].tree.color = Color::Red;
                x = xpp;
                continue;
            }
            let (mut xp_opt, mut xpp_opt) = (Some(xp), Some(xpp));
            if nodes[xp].tree.right == Some(x) {
                x = xp;
                root = rotate_left(nodes, root, x);
                xp_opt = parent(nodes, x);
                xpp_opt = xp_opt.and_then(|p| parent(nodes, p));
            }
            if let Some(xp) = xp_opt {
                nodes[xp].tree.color = Color::Black;
                if let Some(xpp) = xpp_opt {
                    nodes[xpp].tree.color = Color::Red;
                    root = rotate_right(nodes, root, xpp);
                }
            }
        } else {
            if let Some(uncle) = xppl.filter(|&u| is_red(nodes, Some(u))) {
                nodes[uncle].tree.color = Color::Black;
                nodes[xp].tree.color = Color::Black;
                nodes[xpp].tree.color = Color::Red;
                x = xpp;
                continue;
            }
            let (mut xp_opt, mut xpp_opt) = (Some(xp), Some(xpp));
            if nodes[xp].tree.left == Some(x) {
                x = xp;
                root = rotate_right(nodes, root, x);
                xp_opt = parent(nodes, x);
                xpp_opt = xp_opt.and_then(|p| parent(nodes, p));
            }
            if let Some(xp) = xp_opt {
                nodes[xp].tree.color = Color::Black;
                if let Some(xpp) = xpp_opt {
                    nodes[xpp].tree.color = Color::Red;
                    root = rotate_left(nodes, root, xpp);
                }
            }
        }
    }
}

/// Restore the red-black properties after a black entry was unlinked;
/// `x` is the entry that took its place (or the removed leaf itself while
/// it is still attached).
pub(crate) fn balance_deletion<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
    loop {
        if x == root {
            nodes[root].tree.color = Color::Black;
            return root;
        }
        let Some(mut xp) = parent(nodes, x) else {
            nodes[x].tree.color = Color::Black;
            return x;
        };
        if is_red(nodes, Some(x)) {
            nodes[x].tree.color = Color::Black;
            return root;
        }
        if nodes[xp].tree.left == Some(x) {
            let mut xpr = nodes[xp].tree.right;
            if let Some(s) = xpr.filter(|&s| is_red(nodes, Some(s))) {
                nodes[s].tree.color = Color::Black;
                nodes[xp].tree.color = Color::Red;
                root = rotate_left(nodes, root, xp);
                xp = match parent(nodes, x) {
                    Some(p) => p,
                    None => {
                        x = root;
                        continue;
                    }
                };
                xpr = nodes[xp].tree.right;
            }
            let Some(s) = xpr else {
                x = xp;
                continue;
            };
            let (sl, sr) = (nodes[s].tree.left, nodes[s].tree.right);
            if !is_red(nodes, sr) && !is_red(nodes, sl) {
                nodes[s].tree.color = Color::Red;
                x = xp;
                continue;
            }
            let mut s = Some(s);
            let mut xp = Some(xp);
            if !is_red(nodes, sr) {
                if let Some(sl) = sl {
                    nodes[sl].tree.color = Color::Black;
                }
                if let Some(sk) = s {
                    nodes[sk].tree.color = Color::Red;
                    root = rotate_right(nodes, root, sk);
                }
                xp = parent(nodes, x);
                s = xp.and_then(|xp| nodes[xp].tree.right);
            }
            if let Some(sk) = s {
                nodes[sk].tree.color = xp.map_or(Color::Black, |xp| nodes[xp].tree.color);
                if let Some(sr) = nodes[sk].tree.right {
                    nodes[sr].tree.color = Color::Black;
                }
            }
            if let Some(xp) = xp {
                nodes[xp].tree.color = Color::Black;
                root = rotate_left(nodes, root, xp);
            }
            x = root;
        } else {
            let mut xpl = nodes[xp].tree.left;
            if let Some(s) = xpl.filter(|&s| is_red(nodes, Some(s))) {
                nodes[s].tree.color = Color::Black;
                nodes[xp].tree.color = Color::Red;
                root = rotate_right(nodes, root, xp);
                xp = match parent(nodes, x) {
                    Some(p) => p,
                    None => {
                        x = root;
                        continue;
                    }
                };
                xpl = nodes[xp].tree.left;
            }
            let Some(s) = xpl else {
                x = xp;
                continue;
            };
            let (sl, sr) = (nodes[s].tree.left, nodes[s].tree.right);
            if !is_red(nodes, sl) && !is_red(nodes, sr) {
                nodes[s].tree.color = Color::Red;
                x = xp;
                continue;
            }
            let mut s = Some(s);
            let mut xp = Some(xp);
            if !is_red(nodes, sl) {
                if let Some(sr) = sr {
                    nodes[sr].tree.color = Color::Black;
                }
                if let Some(sk) = s {
                    nodes[sk].tree.color = Color::Red;
                    root = rotate_left(nodes, root, sk);
                }
                xp = parent(nodes, x);
                s = xp.and_then(|xp| nodes[xp].tree.left);
            }
            if let Some(sk) = s {
                nodes[sk].tree.color = xp.map_or(Color::Black, |xp| nodes[xp].tree.color);
                if let Some(sl) = nodes[sk].tree.left {
                    nodes[sl].tree.color = Color::Black;
                }
            }
            if let Some(xp) = xp {
                nodes[xp].tree.color = Color::Black;
                root = rotate_right(nodes, root, xp);
            }
            x = root;
        }
    }
}

/// Splice `root` to the front of the order list headed by `first`.
pub(crate) fn move_root_to_front<K, V>(nodes: &mut Arena<K, V>, first: NodeKey, root: NodeKey) -> NodeKey {
    if root != first {
        let rn = nodes[root].next;
        let rp = nodes[root].tree.prev;
        if let Some(rn) = rn {
            nodes[rn].tree.prev = rp;
        }
        if let Some(rp) = rp {
            nodes[rp].next = rn;
        }
        nodes[first].tree.prev = Some(root);
        nodes[root].next = Some(first);
        nodes[root].tree.prev = None;
    }
    root
}

/// Search the subtree at `start` for an entry with `hash` whose key
/// satisfies `eq`. `ord` gives the query's position relative to a
/// hash-equal key when a natural order is available; without it both
/// subtrees of a hash-equal entry are searched.
pub(crate) fn find<K, V>(
    nodes: &Arena<K, V>,
    start: Option<NodeKey>,
    hash: u32,
    eq: &dyn Fn(&K) -> bool,
    ord: Option<&dyn Fn(&K) -> Ordering>,
) -> Option<NodeKey> {
    let mut p = start;
    while let Some(pk) = p {
        let n = &nodes[pk];
        let (pl, pr) = (n.tree.left, n.tree.right);
        p = match n.hash.cmp(&hash) {
            Ordering::Greater => pl,
            Ordering::Less => pr,
            Ordering::Equal if eq(&n.key) => return Some(pk),
            Ordering::Equal if pl.is_none() => pr,
            Ordering::Equal if pr.is_none() => pl,
            Ordering::Equal => match ord.map(|o| o(&n.key)) {
                Some(Ordering::Less) => pl,
                Some(Ordering::Greater) => pr,
                _ => {
                    if let Some(q) = find(nodes, pr, hash, eq, ord) {
                        return Some(q);
                    }
                    pl
                }
            },
        };
    }
    None
}

/// Build a tree over the order list headed by `head` (whose `prev` links
/// are already set). Returns the root, which is now the list head.
pub(crate) fn treeify<K, V>(nodes: &mut Arena<K, V>, head: NodeKey, order: KeyOrder<K>) -> NodeKey {
    let mut root = head;
    {
        let t = &mut nodes[head].tree;
        t.parent = None;
        t.left = None;
        t.right = None;
        t.color = Color::Black;
    }
    let mut next = nodes[head].next;
    while let Some(x) = next {
        next = nodes[x].next;
        nodes[x].tree.left = None;
        nodes[x].tree.right = None;
        let mut p = root;
        loop {
            let dir = placement(nodes, order, x, p);
            let child = if dir == Ordering::Less {
                nodes[p].tree.left
            } else {
                nodes[p].tree.right
            };
            match child {
                Some(c) => p = c,
                None => {
                    nodes[x].tree.parent = Some(p);
                    if dir == Ordering::Less {
                        nodes[p].tree.left = Some(x);
                    } else {
                        nodes[p].tree.right = Some(x);
                    }
                    root = balance_insertion(nodes, root, x);
                    break;
                }
            }
        }
    }
    move_root_to_front(nodes, head, root)
}

/// Set `prev` links along a chain so it can be treeified.
pub(crate) fn link_prev<K, V>(nodes: &mut Arena<K, V>, head: NodeKey) {
    let mut prev = None;
    let mut cur = Some(head);
    while let Some(x) = cur {
        nodes[x].tree.prev = prev;
        prev = Some(x);
        cur = nodes[x].next;
    }
}

/// Strip tree links from every entry of the list at `head`, leaving a chain
/// in the same order.
pub(crate) fn untreeify<K, V>(nodes: &mut Arena<K, V>, head: NodeKey) {
    let mut cur = Some(head);
    while let Some(x) = cur {
        nodes[x].tree = TreeLinks::default();
        cur = nodes[x].next;
    }
}

/// Link the fresh entry `x` (known to be absent) into the tree rooted at
/// `root`. In the order list it follows its tree parent.
pub(crate) fn insert<K, V>(nodes: &mut Arena<K, V>, root: NodeKey, x: NodeKey, order: KeyOrder<K>) -> NodeKey {
    let mut p = root;
    loop {
        let dir = placement(nodes, order, x, p);
        let child = if dir == Ordering::Less {
            nodes[p].tree.left
        } else {
            nodes[p].tree.right
        };
        if let Some(c) = child {
            p = c;
            continue;
        }
        let xpn = nodes[p].next;
        nodes[x].tree = TreeLinks {
            prev: Some(p),
            parent: Some(p),
            ..TreeLinks::default()
        };
        nodes[x].next = xpn;
        nodes[p].next = Some(x);
        if let Some(n) = xpn {
            nodes[n].tree.prev = Some(x);
        }
        if dir == Ordering::Less {
            nodes[p].tree.left = Some(x);
        } else {
            nodes[p].tree.right = Some(x);
        }
        let r = balance_insertion(nodes, root, x);
        return move_root_to_front(nodes, root, r);
    }
}

/// Unlink `p` from the order list headed by `head`; returns the new head.
pub(crate) fn unlink_order<K, V>(nodes: &mut Arena<K, V>, head: NodeKey, p: NodeKey) -> Option<NodeKey> {
    let succ = nodes[p].next.take();
    let pred = nodes[p].tree.prev.take();
    let first = match pred {
        None => succ,
        Some(pred) => {
            nodes[pred].next = succ;
            Some(head)
        }
    };
    if let Some(succ) = succ {
        nodes[succ].tree.prev = pred;
    }
    first
}

/// Remove `p` from the tree rooted at `root` (which must hold other
/// entries) and rebalance. `p`'s tree links are cleared. Returns the new
/// root; the caller re-fronts it in the order list.
pub(crate) fn remove<K, V>(nodes: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let (pl, pr) = (nodes[p].tree.left, nodes[p].tree.right);
    let replacement = match (pl, pr) {
        (Some(pl), Some(pr)) => {
            // Swap `p` with its in-order successor `s` structurally.
            let mut s = pr;
            while let Some(sl) = nodes[s].tree.left {
                s = sl;
            }
            let c = nodes[s].tree.color;
            nodes[s].tree.color = nodes[p].tree.color;
            nodes[p].tree.color = c;
            let sr = nodes[s].tree.right;
            let pp = nodes[p].tree.parent;
            if s == pr {
                nodes[p].tree.parent = Some(s);
                nodes[s].tree.right = Some(p);
            } else {
                let sp = nodes[s].tree.parent;
                nodes[p].tree.parent = sp;
                if let Some(sp) = sp {
                    if nodes[sp].tree.left == Some(s) {
                        nodes[sp].tree.left = Some(p);
                    } else {
                        nodes[sp].tree.right = Some(p);
                    }
                }
                nodes[s].tree.right = Some(pr);
                nodes[pr].tree.parent = Some(s);
            }
            nodes[p].tree.left = None;
            nodes[p].tree.right = sr;
            if let Some(sr) = sr {
                nodes[sr].tree.parent = Some(p);
            }
            nodes[s].tree.left = Some(pl);
            nodes[pl].tree.parent = Some(s);
            nodes[s].tree.parent = pp;
            replace_child(nodes, &mut root, pp, p, s);
            sr.unwrap_or(p)
        }
        (Some(child), None) | (None, Some(child)) => child,
        (None, None) => p,
    };
    if replacement != p {
        let pp = nodes[p].tree.parent;
        nodes[replacement].tree.parent = pp;
        replace_child(nodes, &mut root, pp, p, replacement);
        let t = &mut nodes[p].tree;
        t.left = None;
        t.right = None;
        t.parent = None;
    }
    let r = if nodes[p].tree.color == Color::Red {
        root
    } else {
        balance_deletion(nodes, root, replacement)
    };
    if replacement == p {
        if let Some(pp) = nodes[p].tree.parent.take() {
            if nodes[pp].tree.left == Some(p) {
                nodes[pp].tree.left = None;
            } else if nodes[pp].tree.right == Some(p) {
                nodes[pp].tree.right = None;
            }
        }
    }
    r
}

/// Partition the order list at `head` by `hash & bit`, preserving relative
/// order in both halves. Tree links are left stale for the caller to
/// rebuild or strip.
pub(crate) fn split<K, V>(nodes: &mut Arena<K, V>, head: NodeKey, bit: u32) -> (OrderList, OrderList) {
    let mut lo = OrderList::new(true);
    let mut hi = OrderList::new(true);
    let mut cur = Some(head);
    while let Some(x) = cur {
        cur = nodes[x].next;
        if nodes[x].hash & bit == 0 {
            lo.push(nodes, x);
        } else {
            hi.push(nodes, x);
        }
    }
    (lo, hi)
}

/// Diagnostic check of one tree bucket; returns its entry count.
pub(crate) fn check<K, V>(nodes: &Arena<K, V>, bucket: usize, root: NodeKey) -> Result<usize, InvariantViolation> {
    let rt = nodes[root].tree;
    if rt.parent.is_some() || rt.color != Color::Black {
        return Err(InvariantViolation::BadRoot { bucket });
    }
    if rt.prev.is_some() {
        return Err(InvariantViolation::LinkAsymmetry { bucket });
    }

    let mut in_tree = 0;
    check_subtree(nodes, bucket, Some(root), None, None, None, &mut in_tree)?;

    let mut in_list = 0;
    let mut prev = None;
    let mut cur = Some(root);
    while let Some(x) = cur {
        if nodes[x].tree.prev != prev {
            return Err(InvariantViolation::LinkAsymmetry { bucket });
        }
        // Every list member must be reachable from the root.
        let mut top = x;
        while let Some(p) = nodes[top].tree.parent {
            top = p;
        }
        if top != root {
            return Err(InvariantViolation::TreeListMismatch { bucket });
        }
        in_list += 1;
        prev = Some(x);
        cur = nodes[x].next;
    }
    if in_list != in_tree {
        return Err(InvariantViolation::TreeListMismatch { bucket });
    }
    Ok(in_tree)
}

/// Returns the black height of the subtree at `t`.
fn check_subtree<K, V>(
    nodes: &Arena<K, V>,
    bucket: usize,
    t: Option<NodeKey>,
    parent: Option<NodeKey>,
    lo: Option<u32>,
    hi: Option<u32>,
    count: &mut usize,
) -> Result<usize, InvariantViolation> {
    let Some(t) = t else {
        return Ok(1);
    };
    let n = nodes
        .get(t)
        .ok_or(InvariantViolation::LinkAsymmetry { bucket })?;
    if n.tree.parent != parent {
        return Err(InvariantViolation::LinkAsymmetry { bucket });
    }
    if lo.map_or(false, |lo| n.hash < lo) || hi.map_or(false, |hi| n.hash > hi) {
        return Err(InvariantViolation::OrderViolation { bucket });
    }
    let red = n.tree.color == Color::Red;
    if red && (is_red(nodes, n.tree.left) || is_red(nodes, n.tree.right)) {
        return Err(InvariantViolation::RedRed { bucket });
    }
    *count += 1;
    let lh = check_subtree(nodes, bucket, n.tree.left, Some(t), lo, Some(n.hash), count)?;
    let rh = check_subtree(nodes, bucket, n.tree.right, Some(t), Some(n.hash), hi, count)?;
    if lh != rh {
        return Err(InvariantViolation::BlackHeight { bucket });
    }
    Ok(lh + usize::from(!red))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{walk, Node};
    use slotmap::SlotMap;

    /// Build a chain of `(hash, key)` entries and return its head.
    fn chain(nodes: &mut Arena<u32, u32>, items: &[(u32, u32)]) -> NodeKey {
        let mut list = OrderList::new(false);
        for &(h, k) in items {
            let x = nodes.insert(Node::new(h, k, k * 10));
            list.push(nodes, x);
        }
        list.head.unwrap()
    }

    fn tree_from(nodes: &mut Arena<u32, u32>, items: &[(u32, u32)], order: KeyOrder<u32>) -> NodeKey {
        let head = chain(nodes, items);
        link_prev(nodes, head);
        treeify(nodes, head, order)
    }

    fn keys_in_order(nodes: &Arena<u32, u32>, head: NodeKey) -> Vec<u32> {
        walk(nodes, Some(head)).map(|k| nodes[k].key).collect()
    }

    fn lookup(nodes: &Arena<u32, u32>, root: NodeKey, hash: u32, key: u32) -> Option<NodeKey> {
        find(nodes, Some(root), hash, &|k: &u32| *k == key, None)
    }

    // Small xorshift so tests are reproducible without extra crates.
    fn rng(mut s: u64) -> impl FnMut() -> u64 {
        move || {
            s ^= s << 13;
            s ^= s >> 7;
            s ^= s << 17;
            s
        }
    }

    #[test]
    fn rotations_preserve_in_order_sequence() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..7).map(|i| (i, i)).collect();
        let root = tree_from(&mut nodes, &items, None);
        check(&nodes, 0, root).unwrap();

        fn in_order(nodes: &Arena<u32, u32>, t: Option<NodeKey>, out: &mut Vec<u32>) {
            if let Some(t) = t {
                in_order(nodes, nodes[t].tree.left, out);
                out.push(nodes[t].hash);
                in_order(nodes, nodes[t].tree.right, out);
            }
        }
        let mut before = Vec::new();
        in_order(&nodes, Some(root), &mut before);

        let r = rotate_left(&mut nodes, root, root);
        assert_ne!(r, root, "left rotation at the root moves the root");
        assert_eq!(nodes[r].tree.left, Some(root));
        assert_eq!(nodes[root].tree.parent, Some(r));
        let mut after = Vec::new();
        in_order(&nodes, Some(r), &mut after);
        assert_eq!(before, after);

        let back = rotate_right(&mut nodes, r, r);
        assert_eq!(back, root);
        let mut again = Vec::new();
        in_order(&nodes, Some(back), &mut again);
        assert_eq!(before, again);
    }

    #[test]
    fn rotation_without_child_is_a_no_op() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let root = tree_from(&mut nodes, &[(1, 1)], None);
        assert_eq!(rotate_left(&mut nodes, root, root), root);
        assert_eq!(rotate_right(&mut nodes, root, root), root);
    }

    #[test]
    fn treeify_keeps_order_list_and_fronts_root() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..10).map(|i| (i, i)).collect();
        let root = tree_from(&mut nodes, &items, None);
        check(&nodes, 0, root).unwrap();

        // Root leads the list; the remaining entries keep their original order.
        let order = keys_in_order(&nodes, root);
        assert_eq!(order[0], nodes[root].key);
        let rest: Vec<u32> = order[1..].to_vec();
        let expected: Vec<u32> = (0..10).filter(|&k| k != nodes[root].key).collect();
        assert_eq!(rest, expected);

        for i in 0..10 {
            let found = lookup(&nodes, root, i, i).expect("present");
            assert_eq!(nodes[found].value, i * 10);
        }
        assert!(lookup(&nodes, root, 3, 99).is_none());
        assert!(lookup(&nodes, root, 42, 42).is_none());
    }

    #[test]
    fn equal_hashes_are_found_without_natural_order() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..40).map(|k| (7, k)).collect();
        let root = tree_from(&mut nodes, &items, None);
        check(&nodes, 0, root).unwrap();
        for k in 0..40 {
            assert!(lookup(&nodes, root, 7, k).is_some(), "missing {k}");
        }
        assert!(lookup(&nodes, root, 7, 40).is_none());
    }

    #[test]
    fn natural_order_directs_search_among_equal_hashes() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = [9, 3, 14, 1, 7, 12, 20, 5, 11].iter().map(|&k| (0, k)).collect();
        let root = tree_from(&mut nodes, &items, Some(u32::cmp));
        check(&nodes, 0, root).unwrap();

        fn in_order(nodes: &Arena<u32, u32>, t: Option<NodeKey>, out: &mut Vec<u32>) {
            if let Some(t) = t {
                in_order(nodes, nodes[t].tree.left, out);
                out.push(nodes[t].key);
                in_order(nodes, nodes[t].tree.right, out);
            }
        }
        let mut keys = Vec::new();
        in_order(&nodes, Some(root), &mut keys);
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "equal hashes fall back to key order");

        for &(_, k) in &items {
            let q = k;
            let hit = find(&nodes, Some(root), 0, &|x: &u32| *x == q, Some(&|x: &u32| q.cmp(x)));
            assert_eq!(hit.map(|h| nodes[h].key), Some(k));
        }
    }

    #[test]
    fn insert_links_after_parent_and_keeps_invariants() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..8).map(|i| (i * 2, i)).collect();
        let mut root = tree_from(&mut nodes, &items, None);
        for i in 0..8 {
            let x = nodes.insert(Node::new(i * 2 + 1, 100 + i, 0));
            root = insert(&mut nodes, root, x, None);
            check(&nodes, 0, root).unwrap();
            let p = nodes[x].tree.parent.expect("linked under a parent");
            // Directly after its parent unless rebalancing fronted a new root.
            assert!(nodes[p].next == Some(x) || nodes[x].tree.prev.is_none() || root == p);
        }
        assert_eq!(check(&nodes, 0, root).unwrap(), 16);
    }

    #[test]
    fn remove_every_entry_shape() {
        // Leaf, one-child and two-child removals across many seeds.
        for seed in 1..40u64 {
            let mut next = rng(seed);
            let mut nodes: Arena<u32, u32> = SlotMap::with_key();
            let items: Vec<(u32, u32)> = (0..32).map(|k| ((next() % 16) as u32, k)).collect();
            let mut head = tree_from(&mut nodes, &items, None);
            let mut live: Vec<(u32, u32)> = items.clone();
            while live.len() > 1 {
                let i = (next() % live.len() as u64) as usize;
                let (h, k) = live.swap_remove(i);
                let p = lookup(&nodes, head, h, k).expect("present");
                let first = unlink_order(&mut nodes, head, p).expect("others remain");
                let r = remove(&mut nodes, head, p);
                head = move_root_to_front(&mut nodes, first, r);
                nodes.remove(p);
                assert_eq!(check(&nodes, 0, head).unwrap(), live.len());
                for &(h, k) in &live {
                    assert!(lookup(&nodes, head, h, k).is_some());
                }
            }
        }
    }

    #[test]
    fn split_preserves_relative_order() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..20).map(|k| (k, k)).collect();
        let root = tree_from(&mut nodes, &items, None);
        let before = keys_in_order(&nodes, root);
        let (lo, hi) = split(&mut nodes, root, 4);
        let lo_keys = keys_in_order(&nodes, lo.head.unwrap());
        let hi_keys = keys_in_order(&nodes, hi.head.unwrap());
        let expect_lo: Vec<u32> = before.iter().copied().filter(|k| k & 4 == 0).collect();
        let expect_hi: Vec<u32> = before.iter().copied().filter(|k| k & 4 != 0).collect();
        assert_eq!(lo_keys, expect_lo);
        assert_eq!(hi_keys, expect_hi);
        assert_eq!(lo.len + hi.len, 20);

        let lo_root = treeify(&mut nodes, lo.head.unwrap(), None);
        assert_eq!(check(&nodes, 0, lo_root).unwrap(), lo.len);
        untreeify(&mut nodes, hi.head.unwrap());
        for k in walk(&nodes, hi.head) {
            assert_eq!(nodes[k].tree, TreeLinks::default());
        }
        assert_eq!(keys_in_order(&nodes, hi.head.unwrap()), expect_hi);
    }

    #[test]
    fn randomized_colliding_insert_delete_keeps_invariants() {
        let mut next = rng(0x9e37_79b9_7f4a_7c15);
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        // Few distinct hashes so most comparisons fall through to identity.
        let seed: Vec<(u32, u32)> = (0..8).map(|k| ((k % 3) as u32, k)).collect();
        let mut head = tree_from(&mut nodes, &seed, None);
        let mut live: Vec<(u32, u32)> = seed;
        let mut next_key = 8u32;
        for _ in 0..2000 {
            if live.len() > 8 && next() % 3 == 0 {
                let i = (next() % live.len() as u64) as usize;
                let (h, k) = live.swap_remove(i);
                let p = lookup(&nodes, head, h, k).expect("present");
                let first = unlink_order(&mut nodes, head, p).expect("others remain");
                let r = remove(&mut nodes, head, p);
                head = move_root_to_front(&mut nodes, first, r);
                nodes.remove(p);
            } else {
                let h = (next() % 4) as u32;
                let x = nodes.insert(Node::new(h, next_key, 0));
                head = insert(&mut nodes, head, x, None);
                live.push((h, next_key));
                next_key += 1;
            }
            assert_eq!(check(&nodes, 0, head).unwrap(), live.len());
        }
        for &(h, k) in &live {
            assert!(lookup(&nodes, head, h, k).is_some());
        }
    }

    #[test]
    fn check_detects_red_red_and_bad_root() {
        let mut nodes: Arena<u32, u32> = SlotMap::with_key();
        let items: Vec<(u32, u32)> = (0..3).map(|i| (i, i)).collect();
        let root = tree_from(&mut nodes, &items, None);
        check(&nodes, 0, root).unwrap();

        nodes[root].tree.color = Color::Red;
        assert_eq!(check(&nodes, 5, root), Err(InvariantViolation::BadRoot { bucket: 5 }));
        nodes[root].tree.color = Color::Black;

        let child = nodes[root].tree.left.unwrap();
        nodes[child].tree.color = Color::Black;
        assert_eq!(check(&nodes, 1, root), Err(InvariantViolation::BlackHeight { bucket: 1 }));
    }
}
