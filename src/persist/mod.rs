//! Checkpoint serialization for trees and forests.
//!
//! Runtime trees are mirrored into payload structs and encoded through a
//! single [`ModelCodec`] trait with two format adapters: [`JsonCodec`] for
//! human-readable per-level tree checkpoints and [`BinaryCodec`]
//! (postcard) for compact per-tree forest checkpoints. The tree payload
//! keeps its node map keyed by heap index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::train::{Forest, TrainParams};
use crate::tree::{Node, Tree};
use crate::weak_learner::SplitPoint;

// ============================================================================
// Payloads
// ============================================================================

/// Persisted form of one tree node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodePayload<S> {
    pub leaf: bool,
    pub split_point: Option<SplitPoint>,
    pub statistics: S,
}

/// Persisted form of one tree: depth plus a node map keyed by heap index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreePayload<S> {
    pub depth: u32,
    pub nodes: BTreeMap<u32, NodePayload<S>>,
}

impl<S: Clone> TreePayload<S> {
    pub fn from_tree(tree: &Tree<S>) -> Self {
        let nodes = (0..tree.num_nodes())
            .map(|index| {
                let node = tree.node(index);
                (
                    index as u32,
                    NodePayload {
                        leaf: node.is_leaf(),
                        split_point: node.split_point().copied(),
                        statistics: node.statistics().clone(),
                    },
                )
            })
            .collect();
        Self {
            depth: tree.depth() as u32,
            nodes,
        }
    }
}

impl<S> TreePayload<S> {
    /// Rebuild the runtime tree.
    ///
    /// The node map must be the complete heap `0 .. 2^(depth+1) - 1`.
    pub fn into_tree(self) -> Result<Tree<S>> {
        let depth = self.depth as usize;
        let expected = Tree::<S>::num_nodes_for_depth(depth);
        if self.nodes.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "tree payload holds {} nodes, expected {} for depth {}",
                self.nodes.len(),
                expected,
                depth
            )));
        }
        let mut nodes = Vec::with_capacity(expected);
        for (position, (index, payload)) in self.nodes.into_iter().enumerate() {
            if index as usize != position {
                return Err(Error::InvalidParameter(format!(
                    "tree payload node map is not contiguous at heap index {}",
                    index
                )));
            }
            nodes.push(Node::from_parts(
                payload.leaf,
                payload.split_point,
                payload.statistics,
            ));
        }
        Ok(Tree::from_parts(depth, nodes))
    }
}

/// Persisted form of a forest: training parameters plus its trees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestPayload<S> {
    pub params: TrainParams,
    pub trees: Vec<TreePayload<S>>,
}

impl<S: Clone> ForestPayload<S> {
    pub fn from_forest(forest: &Forest<S>) -> Self {
        Self {
            params: forest.params().clone(),
            trees: forest.trees().iter().map(TreePayload::from_tree).collect(),
        }
    }
}

impl<S> ForestPayload<S> {
    pub fn into_forest(self) -> Result<Forest<S>> {
        let trees = self
            .trees
            .into_iter()
            .map(TreePayload::into_tree)
            .collect::<Result<Vec<_>>>()?;
        Ok(Forest::from_parts(self.params, trees))
    }
}

// ============================================================================
// Codecs
// ============================================================================

/// One serialization format for checkpoint payloads.
pub trait ModelCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
    /// Conventional file extension, without the dot.
    fn extension(&self) -> &'static str;
}

/// Human-readable JSON format.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ModelCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Compact postcard binary format.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl ModelCodec for BinaryCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(postcard::to_allocvec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(postcard::from_bytes(bytes)?)
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Serialize a tree to bytes with `codec`.
pub fn tree_to_bytes<S, C>(codec: &C, tree: &Tree<S>) -> Result<Vec<u8>>
where
    S: Clone + Serialize,
    C: ModelCodec,
{
    codec.encode(&TreePayload::from_tree(tree))
}

/// Deserialize a tree from bytes with `codec`.
pub fn tree_from_bytes<S, C>(codec: &C, bytes: &[u8]) -> Result<Tree<S>>
where
    S: DeserializeOwned,
    C: ModelCodec,
{
    codec.decode::<TreePayload<S>>(bytes)?.into_tree()
}

/// Serialize a forest to bytes with `codec`.
pub fn forest_to_bytes<S, C>(codec: &C, forest: &Forest<S>) -> Result<Vec<u8>>
where
    S: Clone + Serialize,
    C: ModelCodec,
{
    codec.encode(&ForestPayload::from_forest(forest))
}

/// Deserialize a forest from bytes with `codec`.
pub fn forest_from_bytes<S, C>(codec: &C, bytes: &[u8]) -> Result<Forest<S>>
where
    S: DeserializeOwned,
    C: ModelCodec,
{
    codec.decode::<ForestPayload<S>>(bytes)?.into_forest()
}

/// Write a JSON tree checkpoint.
pub fn write_tree_json<S: Clone + Serialize>(path: &Path, tree: &Tree<S>) -> Result<()> {
    fs::write(path, tree_to_bytes(&JsonCodec, tree)?)?;
    Ok(())
}

/// Read a JSON tree checkpoint.
pub fn read_tree_json<S: DeserializeOwned>(path: &Path) -> Result<Tree<S>> {
    tree_from_bytes(&JsonCodec, &fs::read(path)?)
}

/// Write a binary forest checkpoint.
pub fn write_forest_binary<S: Clone + Serialize>(path: &Path, forest: &Forest<S>) -> Result<()> {
    fs::write(path, forest_to_bytes(&BinaryCodec, forest)?)?;
    Ok(())
}

/// Read a binary forest checkpoint.
pub fn read_forest_binary<S: DeserializeOwned>(path: &Path) -> Result<Forest<S>> {
    forest_from_bytes(&BinaryCodec, &fs::read(path)?)
}

// ============================================================================
// Tests
// ============================================================================
