//! Gradient-boosted regression trees with a softmax objective.
//!
//! Each boosting round fits one regression tree per class to the first and
//! second derivatives of the multi-class log loss. Leaf weights are the
//! Newton step `-G / (H + lambda)`; splits maximize the matching
//! structure-score gain. Prediction sums the initial class scores and every
//! tree's output scaled by the learning rate, then applies softmax.
//!
//! Training is exact greedy: every feature is presorted once, and each split
//! partitions the presorted lists so the order never has to be recomputed.

use serde::{Deserialize, Serialize};

/// Hessians are clamped to this to keep leaf weights bounded
const MIN_HESSIAN: f64 = 1e-6;

/// Smallest gain accepted for a split
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 500,
            learning_rate: 0.05,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
        }
    }
}

/// Node in a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index to split on (negative = leaf node).
    pub feature: i32,
    /// Split threshold; samples with `value <= threshold` go left.
    pub threshold: f64,
    pub left_child: i32,
    pub right_child: i32,
    /// Leaf weight
    pub value: f64,
}

impl TreeNode {
    fn leaf(value: f64) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left_child: -1,
            right_child: -1,
            value,
        }
    }

    fn is_leaf(&self) -> bool {
        self.feature < 0
    }
}

/// Regression tree stored as a flat node list, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Leaf weight for a single sample
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        while let Some(node) = self.nodes.get(idx) {
            if node.is_leaf() {
                return node.value;
            }
            let value = features.get(node.feature as usize).copied().unwrap_or(0.0);
            let next = if value <= node.threshold {
                node.left_child
            } else {
                node.right_child
            };
            idx = match usize::try_from(next) {
                Ok(next) => next,
                Err(_) => return 0.0,
            };
        }
        0.0
    }

    /// Check that the node list forms a tree over `n_features` inputs.
    ///
    /// Children always come after their parent, which also rules out cycles.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if !node.value.is_finite() {
                    return Err(format!("node {} has a non-finite leaf value", i));
                }
                continue;
            }
            if node.feature as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", i, node.feature));
            }
            for child in [node.left_child, node.right_child] {
                let in_range = usize::try_from(child)
                    .map(|c| c > i && c < self.nodes.len())
                    .unwrap_or(false);
                if !in_range {
                    return Err(format!("node {} has invalid child {}", i, child));
                }
            }
        }
        Ok(())
    }
}

/// Numerically stable softmax
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Multi-class boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxBooster {
    pub n_classes: usize,
    pub n_features: usize,
    pub learning_rate: f64,
    /// Log class priors the trees correct
    pub initial_scores: Vec<f64>,
    /// One tree per class for every round
    pub rounds: Vec<Vec<RegressionTree>>,
}

impl SoftmaxBooster {
    /// Fit to `rows` labelled with class indices in `0..n_classes`
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        params: &BoostingParams,
    ) -> Result<Self, String> {
        if rows.is_empty() {
            return Err("no training rows".into());
        }
        if rows.len() != labels.len() {
            return Err("rows and labels differ in length".into());
        }
        if let Some(bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(format!("label {} outside 0..{}", bad, n_classes));
        }
        let n_features = rows[0].len();
        if rows.iter().any(|r| r.len() != n_features) {
            return Err("rows differ in width".into());
        }

        let n = rows.len();
        let mut counts = vec![0usize; n_classes];
        for &label in labels {
            counts[label] += 1;
        }
        let initial_scores: Vec<f64> = counts
            .iter()
            .map(|&c| ((c as f64 + 1.0) / (n as f64 + n_classes as f64)).ln())
            .collect();

        let presorted: Vec<Vec<usize>> = (0..n_features)
            .map(|f| {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| rows[a][f].total_cmp(&rows[b][f]));
                order
            })
            .collect();

        let mut scores: Vec<Vec<f64>> = vec![initial_scores.clone(); n];
        let mut rounds = Vec::with_capacity(params.n_estimators);
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut goes_left = vec![false; n];

        for _ in 0..params.n_estimators {
            let probs: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let mut trees = Vec::with_capacity(n_classes);

            for class in 0..n_classes {
                for i in 0..n {
                    let p = probs[i][class];
                    let y = if labels[i] == class { 1.0 } else { 0.0 };
                    grad[i] = p - y;
                    hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                }

                let mut builder = TreeBuilder {
                    rows,
                    grad: &grad,
                    hess: &hess,
                    params,
                    goes_left: &mut goes_left,
                    nodes: Vec::new(),
                };
                builder.grow(presorted.clone(), 0);
                trees.push(RegressionTree {
                    nodes: builder.nodes,
                });
            }

            for (i, row) in rows.iter().enumerate() {
                for (class, tree) in trees.iter().enumerate() {
                    scores[i][class] += params.learning_rate * tree.predict(row);
                }
            }
            rounds.push(trees);
        }

        Ok(Self {
            n_classes,
            n_features,
            learning_rate: params.learning_rate,
            initial_scores,
            rounds,
        })
    }

    /// Summed class scores before softmax
    pub fn raw_scores(&self, features: &[f64]) -> Vec<f64> {
        let mut scores = self.initial_scores.clone();
        for trees in &self.rounds {
            for (score, tree) in scores.iter_mut().zip(trees) {
                *score += self.learning_rate * tree.predict(features);
            }
        }
        scores
    }

    /// Class probabilities, summing to 1
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        softmax(&self.raw_scores(features))
    }

    /// Most probable class
    pub fn predict(&self, features: &[f64]) -> usize {
        argmax(&self.predict_proba(features))
    }

    pub fn n_estimators(&self) -> usize {
        self.rounds.len()
    }

    /// Structural check for an ensemble read from disk
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_scores.len() != self.n_classes {
            return Err(format!(
                "{} initial scores for {} classes",
                self.initial_scores.len(),
                self.n_classes
            ));
        }
        for (r, trees) in self.rounds.iter().enumerate() {
            if trees.len() != self.n_classes {
                return Err(format!("round {} has {} trees", r, trees.len()));
            }
            for tree in trees {
                tree.validate(self.n_features)
                    .map_err(|e| format!("round {}: {}", r, e))?;
            }
        }
        Ok(())
    }
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

// ============================================================================
// Tree growing
// ============================================================================

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoostingParams,
    goes_left: &'a mut Vec<bool>,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Grow a subtree over `samples` (the node's members sorted by each
    /// feature) and return its root index
    fn grow(&mut self, samples: Vec<Vec<usize>>, depth: usize) -> i32 {
        let members = &samples[0];
        let g: f64 = members.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = members.iter().map(|&i| self.hess[i]).sum();
        let lambda = self.params.lambda;

        let index = self.nodes.len();
        self.nodes.push(TreeNode::leaf(-g / (h + lambda)));

        if depth >= self.params.max_depth || members.len() < 2 {
            return index as i32;
        }

        let Some(split) = self.best_split(&samples, g, h) else {
            return index as i32;
        };

        for &i in members {
            self.goes_left[i] = self.rows[i][split.feature] <= split.threshold;
        }
        let (left, right): (Vec<Vec<usize>>, Vec<Vec<usize>>) = samples
            .into_iter()
            .map(|sorted| sorted.into_iter().partition::<Vec<usize>, _>(|&i| self.goes_left[i]))
            .unzip();

        let left_child = self.grow(left, depth + 1);
        let right_child = self.grow(right, depth + 1);

        self.nodes[index] = TreeNode {
            feature: split.feature as i32,
            threshold: split.threshold,
            left_child,
            right_child,
            value: 0.0,
        };
        index as i32
    }

    fn best_split(&self, samples: &[Vec<usize>], g: f64, h: f64) -> Option<Split> {
        let lambda = self.params.lambda;
        let min_child = self.params.min_child_weight;
        let parent_score = g * g / (h + lambda);
        let mut best: Option<Split> = None;

        for (feature, sorted) in samples.iter().enumerate() {
            let mut gl = 0.0;
            let mut hl = 0.0;

            for pair in sorted.windows(2) {
                let (cur, next) = (pair[0], pair[1]);
                gl += self.grad[cur];
                hl += self.hess[cur];

                let (v_cur, v_next) = (self.rows[cur][feature], self.rows[next][feature]);
                if v_next <= v_cur {
                    continue;
                }

                let (gr, hr) = (g - gl, h - hl);
                if hl < min_child || hr < min_child {
                    continue;
                }

                let gain = 0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score);
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: v_cur + (v_next - v_cur) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}
