//! Sparse vector format consumed by the optimizer.
//!
//! Every vector is a list of `(index, value)` nodes with 1-based feature
//! indices, terminated by a node whose index is `SENTINEL_INDEX`. This is the
//! only place feature vectors are converted into that format.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VadError};

/// Index value marking the end of a sparse vector.
pub const SENTINEL_INDEX: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmNode {
    pub index: i32,
    pub value: f64,
}

impl SvmNode {
    pub const SENTINEL: SvmNode = SvmNode {
        index: SENTINEL_INDEX,
        value: 0.0,
    };

    pub fn is_sentinel(&self) -> bool {
        self.index == SENTINEL_INDEX
    }
}

/// Convert a dense feature vector into sentinel-terminated sparse nodes.
///
/// Every feature is emitted, zeros included, so the node layout depends only
/// on the dimension.
///
/// # Errors
/// `VadError::DimensionMismatch` if `features.len() != num_features`.
pub fn marshal(features: &[f64], num_features: usize) -> Result<Vec<SvmNode>> {
    if features.len() != num_features {
        return Err(VadError::DimensionMismatch {
            expected: num_features,
            actual: features.len(),
        });
    }
    let mut nodes = Vec::with_capacity(num_features + 1);
    nodes.extend(features.iter().enumerate().map(|(j, &value)| SvmNode {
        index: j as i32 + 1,
        value,
    }));
    nodes.push(SvmNode::SENTINEL);
    Ok(nodes)
}

/// Nodes before the sentinel (or the whole slice if none).
pub fn active(nodes: &[SvmNode]) -> &[SvmNode] {
    let end = nodes.iter().position(SvmNode::is_sentinel).unwrap_or(nodes.len());
    &nodes[..end]
}

/// A labeled training set in sparse form.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub num_features: usize,
    pub labels: Vec<i32>,
    pub vectors: Vec<Vec<SvmNode>>,
}

impl Problem {
    pub fn with_capacity(num_features: usize, capacity: usize) -> Self {
        Self {
            num_features,
            labels: Vec::with_capacity(capacity),
            vectors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, label: i32, nodes: Vec<SvmNode>) {
        self.labels.push(label);
        self.vectors.push(nodes);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_uses_one_based_indices_and_sentinel() {
        let nodes = marshal(&[0.5, 0.0, -2.0], 3).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(
            nodes[..3],
            [
                SvmNode { index: 1, value: 0.5 },
                SvmNode { index: 2, value: 0.0 },
                SvmNode { index: 3, value: -2.0 },
            ]
        );
        assert!(nodes[3].is_sentinel());
    }

    #[test]
    fn marshal_checks_dimension_first() {
        assert!(matches!(
            marshal(&[1.0, 2.0], 3),
            Err(VadError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn active_strips_sentinel() {
        let nodes = marshal(&[1.0, 2.0], 2).unwrap();
        assert_eq!(active(&nodes).len(), 2);
        assert_eq!(active(&nodes[..1]).len(), 1);
    }
}
