//! Serialization of [`BTreeNode`] into and out of a [`storage::Page`] body.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult};
use storage::Page;

use crate::node::BTreeNode;

fn bincode_config() -> impl Config {
    config::legacy()
}

pub fn decode_node(page: &Page) -> DbResult<BTreeNode> {
    let (node, _) = decode_from_slice(page.body(), bincode_config())
        .map_err(|e| DbError::Storage(format!("failed to decode btree node: {e}")))?;
    Ok(node)
}

pub fn encode_node(page: &mut Page, node: &BTreeNode) -> DbResult<()> {
    let written = encode_into_slice(node, page.body_mut(), bincode_config())
        .map_err(|e| DbError::Storage(format!("failed to encode btree node: {e}")))?;
    if written > page.body().len() {
        return Err(DbError::Storage("btree node overflowed its page".into()));
    }
    Ok(())
}
