//! A leaf-only B+Tree: integer keys, string values, no splits or merges.
//!
//! Every operation is expressed against a [`BufferPool`] rather than owning a file
//! directly, since table and index trees share the same pool and page file as the
//! catalog. There is at most one pin held per operation in steady state: internal
//! nodes are pinned and unpinned again immediately during descent, and only the
//! leaf actually touched stays pinned for the duration of the caller's mutation.

mod node;
mod page;

pub use node::{BTreeNode, InternalNode, LeafNode, ORDER, TOMBSTONE};
pub use page::{decode_node, encode_node};

use buffer::BufferPool;
use common::{DbError, DbResult, PageId};
use storage::PageType;

/// Allocate a fresh page, initialize it as an empty leaf, and return its id. Used
/// both for a brand new table's root and for a secondary index's root.
pub fn create_empty_leaf(pool: &mut BufferPool) -> DbResult<PageId> {
    let (id, idx) = pool.allocate_page(PageType::Leaf)?;
    encode_node(pool.page_mut(idx), &BTreeNode::Leaf(LeafNode::empty()))?;
    pool.unpin(id, true)?;
    Ok(id)
}

/// Descend from `root` to the leaf that should contain `key`, unpinning every
/// internal node touched along the way. The leaf itself is left unpinned too --
/// callers pin it exactly once for their own read or mutation.
fn find_leaf(pool: &mut BufferPool, root: PageId, key: i32) -> DbResult<PageId> {
    let mut current = root;
    loop {
        let idx = pool.get(current)?;
        let node = decode_node(pool.page(idx))?;
        pool.unpin(current, false)?;

        match node {
            BTreeNode::Leaf(_) => return Ok(current),
            BTreeNode::Internal(internal) => {
                current = internal.route(key);
            }
        }
    }
}

fn leaf_at(pool: &mut BufferPool, page_id: PageId) -> DbResult<(usize, LeafNode)> {
    let idx = pool.get(page_id)?;
    match decode_node(pool.page(idx))? {
        BTreeNode::Leaf(leaf) => Ok((idx, leaf)),
        BTreeNode::Internal(_) => Err(DbError::Storage("find_leaf returned non-leaf node".into())),
    }
}

/// Descend to the target leaf and return a copy of `key`'s value, if live.
pub fn search(pool: &mut BufferPool, root: PageId, key: i32) -> DbResult<Option<String>> {
    let leaf_id = find_leaf(pool, root, key)?;
    let (idx, leaf) = leaf_at(pool, leaf_id)?;
    let _ = idx;
    let value = leaf.position_of(key).map(|i| leaf.values[i].clone());
    pool.unpin(leaf_id, false)?;
    Ok(value)
}

/// Insert or overwrite `key`. Returns `false` (without error) if the leaf is at
/// capacity -- B+Tree overflow is a silent capacity failure, not an error.
pub fn insert(pool: &mut BufferPool, root: PageId, key: i32, value: &str) -> DbResult<bool> {
    let leaf_id = find_leaf(pool, root, key)?;
    let (idx, mut leaf) = leaf_at(pool, leaf_id)?;
    let inserted = leaf.insert_or_update(key, value);
    encode_node(pool.page_mut(idx), &BTreeNode::Leaf(leaf))?;
    pool.unpin(leaf_id, inserted)?;
    Ok(inserted)
}

/// Tombstone `key` if present. Returns whether a live entry was found.
pub fn delete(pool: &mut BufferPool, root: PageId, key: i32) -> DbResult<bool> {
    let leaf_id = find_leaf(pool, root, key)?;
    let (idx, mut leaf) = leaf_at(pool, leaf_id)?;
    let deleted = leaf.delete(key);
    if deleted {
        encode_node(pool.page_mut(idx), &BTreeNode::Leaf(leaf))?;
    }
    pool.unpin(leaf_id, deleted)?;
    Ok(deleted)
}

/// Walk the leaf chain from `root` in key order, yielding every live `(key, value)`
/// pair. `root` must itself be a leaf -- this design's trees are always leaf-only.
pub fn scan(pool: &mut BufferPool, root: PageId) -> DbResult<Vec<(i32, String)>> {
    let mut out = Vec::new();
    let mut current = root;
    loop {
        let (idx, leaf) = leaf_at(pool, current)?;
        let _ = idx;
        out.extend(leaf.iter_live().map(|(k, v)| (k, v.to_string())));
        let next = leaf.next_leaf;
        pool.unpin(current, false)?;
        if next == PageId(0) {
            return Ok(out);
        }
        current = next;
    }
}
