//! Read-only CART decision tree loaded from a scikit-learn export.
//!
//! The artifact is the JSON dump of a fitted `DecisionTreeClassifier.tree_`:
//! parallel `children_left`, `children_right`, `feature`, `threshold` and
//! `value` arrays, with `-1` marking a missing child. Loading rejects any
//! artifact that is not a single finite binary-classification tree rooted at
//! node 0, so traversal never needs to re-check structure.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelLoadError, PredictError};
use crate::models::{Field, Outcome, PredictionResult, FEATURE_COUNT};

/// Artifact layout version this crate understands.
pub const FORMAT_VERSION: u32 = 1;

const LEAF: i64 = -1;

#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
}

#[derive(Deserialize)]
struct Artifact {
    n_features: usize,
    n_classes: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    class_names: Option<Vec<String>>,
    tree: TreeArrays,
}

#[derive(Deserialize)]
struct TreeArrays {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Training samples per class that reached this node.
    pub counts: Vec<f64>,
}

impl TreeNode {
    pub fn samples(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Majority class; ties go to the lower class index.
    pub fn majority(&self) -> Outcome {
        match self.counts.as_slice() {
            [alive, death, ..] if death > alive => Outcome::Death,
            _ => Outcome::Alive,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }
}

/// Which branch of its parent a node hangs from. Left is the `<=` branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One decision taken while routing a feature vector to its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathStep {
    pub node: usize,
    pub feature: usize,
    pub threshold: f64,
    pub value: f64,
    pub side: Side,
}

#[derive(Debug, Clone)]
pub struct DecisionTreeModel {
    n_features: usize,
    feature_names: Vec<String>,
    class_names: Vec<String>,
    nodes: Vec<TreeNode>,
    depth: usize,
}

impl DecisionTreeModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&contents)?;

        log::info!(
            "Loaded decision tree from {} ({} nodes, {} leaves, depth {})",
            path.display(),
            model.node_count(),
            model.leaf_count(),
            model.depth()
        );
        Ok(model)
    }

    pub fn from_json(contents: &str) -> Result<Self, ModelLoadError> {
        let header: ArtifactHeader = serde_json::from_str(contents)?;
        if header.format_version != FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion {
                found: header.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let artifact: Artifact = serde_json::from_str(contents)?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: Artifact) -> Result<Self, ModelLoadError> {
        let Artifact {
            n_features,
            n_classes,
            feature_names,
            class_names,
            tree,
        } = artifact;

        if n_classes != Outcome::ALL.len() {
            return Err(corrupt(format!(
                "expected a binary classifier, found {n_classes} classes"
            )));
        }
        if n_features == 0 {
            return Err(corrupt("model declares no features"));
        }

        let feature_names = match feature_names {
            Some(names) if names.len() != n_features => {
                return Err(corrupt(format!(
                    "{} feature names for {n_features} features",
                    names.len()
                )))
            }
            Some(names) => names,
            None => default_feature_names(n_features),
        };
        let class_names = match class_names {
            Some(names) if names.len() != n_classes => {
                return Err(corrupt(format!(
                    "{} class names for {n_classes} classes",
                    names.len()
                )))
            }
            Some(names) => names,
            None => Outcome::ALL.iter().map(|o| o.label().to_string()).collect(),
        };

        let nodes = build_nodes(tree, n_features, n_classes)?;
        let depth = check_tree_shape(&nodes)?;

        Ok(Self {
            n_features,
            feature_names,
            class_names,
            nodes,
            depth,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Longest root to leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn feature_name(&self, feature: usize) -> &str {
        self.feature_names
            .get(feature)
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn class_name(&self, outcome: Outcome) -> &str {
        self.class_names
            .get(outcome.class())
            .map(String::as_str)
            .unwrap_or_else(|| outcome.label())
    }

    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult, PredictError> {
        self.check_input(features)?;
        let leaf = self.route(features, |_| {});
        let node = &self.nodes[leaf];
        let result = PredictionResult::new(node.majority(), leaf, &node.counts);

        log::debug!(
            "Routed feature vector to leaf {leaf}: {} (confidence {:.2})",
            result.label,
            result.confidence
        );
        Ok(result)
    }

    pub fn decision_path(&self, features: &[f64]) -> Result<Vec<PathStep>, PredictError> {
        self.check_input(features)?;
        let mut steps = Vec::with_capacity(self.depth);
        self.route(features, |step| steps.push(step));
        Ok(steps)
    }

    pub fn describe(&self) -> TreeDescription<'_> {
        TreeDescription { model: self }
    }

    fn check_input(&self, features: &[f64]) -> Result<(), PredictError> {
        if features.len() != self.n_features {
            return Err(PredictError::InvalidInput {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|value| !value.is_finite()) {
            return Err(PredictError::NonFiniteInput { index });
        }
        Ok(())
    }

    /// Walks from the root to a leaf, `<=` going left. Input must already be
    /// checked against `n_features`.
    fn route(&self, features: &[f64], mut visit: impl FnMut(PathStep)) -> usize {
        let mut id = 0;
        while let NodeKind::Split {
            feature,
            threshold,
            left,
            right,
        } = self.nodes[id].kind
        {
            let value = features[feature];
            let side = if value <= threshold {
                Side::Left
            } else {
                Side::Right
            };
            visit(PathStep {
                node: id,
                feature,
                threshold,
                value,
                side,
            });
            id = match side {
                Side::Left => left,
                Side::Right => right,
            };
        }
        id
    }
}

fn corrupt(message: impl Into<String>) -> ModelLoadError {
    ModelLoadError::Corrupt(message.into())
}

fn default_feature_names(n_features: usize) -> Vec<String> {
    if n_features == FEATURE_COUNT {
        Field::ALL
            .iter()
            .map(|field| field.display_name().to_string())
            .collect()
    } else {
        (0..n_features).map(|idx| format!("x[{idx}]")).collect()
    }
}

fn build_nodes(
    tree: TreeArrays,
    n_features: usize,
    n_classes: usize,
) -> Result<Vec<TreeNode>, ModelLoadError> {
    let count = tree.children_left.len();
    if count == 0 {
        return Err(corrupt("tree has no nodes"));
    }
    let lengths = [
        tree.children_right.len(),
        tree.feature.len(),
        tree.threshold.len(),
        tree.value.len(),
    ];
    if lengths.iter().any(|len| *len != count) {
        return Err(corrupt(format!(
            "tree arrays disagree on node count ({count} vs {lengths:?})"
        )));
    }

    let child = |id: usize, raw: i64| -> Result<usize, ModelLoadError> {
        usize::try_from(raw)
            .ok()
            .filter(|child| *child < count)
            .ok_or_else(|| corrupt(format!("node {id} has child index {raw} out of range")))
    };

    let mut nodes = Vec::with_capacity(count);
    for (id, counts) in tree.value.into_iter().enumerate() {
        if counts.len() != n_classes {
            return Err(corrupt(format!(
                "node {id} has {} class counts, expected {n_classes}",
                counts.len()
            )));
        }
        if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(corrupt(format!("node {id} has invalid class counts")));
        }

        let kind = match (tree.children_left[id], tree.children_right[id]) {
            (LEAF, LEAF) => {
                if counts.iter().sum::<f64>() <= 0.0 {
                    return Err(corrupt(format!("leaf {id} holds no samples")));
                }
                NodeKind::Leaf
            }
            (left, right) => {
                let feature = usize::try_from(tree.feature[id])
                    .ok()
                    .filter(|feature| *feature < n_features)
                    .ok_or_else(|| {
                        corrupt(format!(
                            "node {id} splits on feature {} but the model has {n_features}",
                            tree.feature[id]
                        ))
                    })?;
                let threshold = tree.threshold[id];
                if !threshold.is_finite() {
                    return Err(corrupt(format!("node {id} has a non-finite threshold")));
                }
                NodeKind::Split {
                    feature,
                    threshold,
                    left: child(id, left)?,
                    right: child(id, right)?,
                }
            }
        };

        nodes.push(TreeNode { kind, counts });
    }

    Ok(nodes)
}

/// Checks that the nodes form one tree rooted at 0 and returns its depth.
fn check_tree_shape(nodes: &[TreeNode]) -> Result<usize, ModelLoadError> {
    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
    for (id, node) in nodes.iter().enumerate() {
        if let NodeKind::Split { left, right, .. } = node.kind {
            for child in [left, right] {
                if child == 0 {
                    return Err(corrupt(format!("node {id} points back at the root")));
                }
                if let Some(other) = parent[child] {
                    return Err(corrupt(format!(
                        "node {child} has two parents ({other} and {id})"
                    )));
                }
                parent[child] = Some(id);
            }
        }
    }

    // With single parents and a parentless root, a walk from the root visits
    // each reachable node once; anything left over sits on a detached cycle.
    let mut visited = 0;
    let mut depth = 0;
    let mut stack = vec![(0usize, 0usize)];
    while let Some((id, level)) = stack.pop() {
        visited += 1;
        depth = depth.max(level);
        if let NodeKind::Split { left, right, .. } = nodes[id].kind {
            stack.push((right, level + 1));
            stack.push((left, level + 1));
        }
    }
    if visited != nodes.len() {
        return Err(corrupt(format!(
            "{} nodes are unreachable from the root",
            nodes.len() - visited
        )));
    }

    Ok(depth)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeRole<'a> {
    Split {
        feature: usize,
        feature_name: &'a str,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        outcome: Outcome,
        class_name: &'a str,
    },
}

/// Renderer-facing view of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescriptor<'a> {
    pub id: usize,
    pub parent: Option<usize>,
    pub side: Option<Side>,
    pub depth: usize,
    pub role: NodeRole<'a>,
    pub samples: f64,
    pub distribution: &'a [f64],
    /// Majority class at this node, whether split or leaf.
    pub majority: Outcome,
}

/// Restartable pre-order walk over a loaded tree. Parents always come before
/// their children and left subtrees before right ones.
#[derive(Debug, Clone, Copy)]
pub struct TreeDescription<'a> {
    model: &'a DecisionTreeModel,
}

impl<'a> TreeDescription<'a> {
    pub fn model(&self) -> &'a DecisionTreeModel {
        self.model
    }

    pub fn len(&self) -> usize {
        self.model.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.model.nodes.is_empty()
    }

    pub fn iter(&self) -> Descriptors<'a> {
        Descriptors {
            model: self.model,
            stack: vec![Pending {
                id: 0,
                parent: None,
                side: None,
                depth: 0,
            }],
            remaining: self.model.node_count(),
        }
    }
}

impl<'a> IntoIterator for TreeDescription<'a> {
    type Item = NodeDescriptor<'a>;
    type IntoIter = Descriptors<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &TreeDescription<'a> {
    type Item = NodeDescriptor<'a>;
    type IntoIter = Descriptors<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Pending {
    id: usize,
    parent: Option<usize>,
    side: Option<Side>,
    depth: usize,
}

pub struct Descriptors<'a> {
    model: &'a DecisionTreeModel,
    stack: Vec<Pending>,
    remaining: usize,
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = NodeDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let Pending {
            id,
            parent,
            side,
            depth,
        } = self.stack.pop()?;
        let model = self.model;
        let node = &model.nodes[id];

        let role = match node.kind {
            NodeKind::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                for (child, child_side) in [(right, Side::Right), (left, Side::Left)] {
                    self.stack.push(Pending {
                        id: child,
                        parent: Some(id),
                        side: Some(child_side),
                        depth: depth + 1,
                    });
                }
                NodeRole::Split {
                    feature,
                    feature_name: model.feature_name(feature),
                    threshold,
                    left,
                    right,
                }
            }
            NodeKind::Leaf => NodeRole::Leaf {
                outcome: node.majority(),
                class_name: model.class_name(node.majority()),
            },
        };

        self.remaining = self.remaining.saturating_sub(1);
        Some(NodeDescriptor {
            id,
            parent,
            side,
            depth,
            role,
            samples: node.samples(),
            distribution: &node.counts,
            majority: node.majority(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Descriptors<'_> {}
