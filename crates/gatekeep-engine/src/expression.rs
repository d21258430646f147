//! Identity set algebra.
//!
//! An [`IdentityExpression`] names a set of identities. Its edges are folded
//! in order, starting from the empty set:
//!
//! | Edge                     | Effect on the running set           |
//! |--------------------------|-------------------------------------|
//! | `Include` identity `i`   | insert `i`                          |
//! | `Exclude` identity `i`   | remove `i`                          |
//! | `Include` expression `c` | union with the set of `c`           |
//! | `Exclude` expression `c` | subtract the set of `c`             |
//!
//! There is no complement: an expression with no edges is the empty set.
//! Order matters, so `[+a, -{a}]` is empty while `[-{a}, +a]` contains `a`.
//!
//! Expressions form a DAG that [`ExpressionGraph::build`] checks once per
//! snapshot. Nodes on a cycle, nodes with dangling edges, nodes nested deeper
//! than [`MAX_EXPRESSION_DEPTH`], and every node that depends on one of those
//! are quarantined: they evaluate to an error
//! instead of a set, and the rest of the graph keeps working.
//!
//! Two evaluation strategies are provided and always agree:
//! - [`ExpressionGraph::members`] materializes and caches the whole set.
//! - [`ExpressionGraph::contains`] tests one identity without building sets.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use gatekeep_types::{ExpressionId, IdentityId};
use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::error::ConfigurationError;

/// A materialized identity set.
pub type IdentitySet = BTreeSet<IdentityId>;

// ============================================================================
// Edges
// ============================================================================

/// Whether an edge adds to or removes from the running set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeOp {
    Include,
    Exclude,
}

/// What an edge points at: a single identity (leaf) or another expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeTarget {
    Identity(IdentityId),
    Expression(ExpressionId),
}

impl Display for EdgeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity(id) => write!(f, "identity {id}"),
            Self::Expression(id) => write!(f, "expression {id}"),
        }
    }
}

/// One ordered step of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub op: EdgeOp,
    pub target: EdgeTarget,
}

impl Edge {
    pub fn include_identity(id: IdentityId) -> Self {
        Self {
            op: EdgeOp::Include,
            target: EdgeTarget::Identity(id),
        }
    }

    pub fn exclude_identity(id: IdentityId) -> Self {
        Self {
            op: EdgeOp::Exclude,
            target: EdgeTarget::Identity(id),
        }
    }

    pub fn include_expression(id: ExpressionId) -> Self {
        Self {
            op: EdgeOp::Include,
            target: EdgeTarget::Expression(id),
        }
    }

    pub fn exclude_expression(id: ExpressionId) -> Self {
        Self {
            op: EdgeOp::Exclude,
            target: EdgeTarget::Expression(id),
        }
    }
}

/// A named node in the expression graph.
///
/// `edges` is evaluated front to back; its order is part of the meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityExpression {
    pub id: ExpressionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl IdentityExpression {
    pub fn new(id: ExpressionId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            edges: Vec::new(),
        }
    }

    /// Appends an edge (builder pattern).
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

// ============================================================================
// ExpressionGraph
// ============================================================================

#[derive(Debug)]
struct Node {
    expression: IdentityExpression,
    defect: Option<ConfigurationError>,
    /// Lazily materialized set. First writer wins; losers drop their copy.
    members: OnceLock<Arc<IdentitySet>>,
}

/// Longest allowed chain of nested expressions, counting the expression
/// itself. Deeper expressions are quarantined with
/// [`ConfigurationError::ExpressionTooDeep`], which bounds the recursion of
/// [`ExpressionGraph::members`] and [`ExpressionGraph::contains`].
pub const MAX_EXPRESSION_DEPTH: usize = 128;

/// An expression that names the same target in more than one edge.
///
/// Not a defect: every edge is still folded in order, so the last edge
/// touching the target decides. Reported so operators can tidy the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatedEdge {
    pub expression: ExpressionId,
    pub target: EdgeTarget,
}

/// The validated expression DAG of one snapshot, with its member cache.
#[derive(Debug, Default)]
pub struct ExpressionGraph {
    nodes: HashMap<ExpressionId, Node>,
    repeated: Vec<RepeatedEdge>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// One expression on the explicit depth-first stack.
struct Frame {
    id: ExpressionId,
    children: Vec<ExpressionId>,
    next: usize,
}

impl ExpressionGraph {
    /// Builds and validates the graph.
    ///
    /// `identities` is the set of known identity ids; edges to anything else
    /// are dangling. Returns the graph together with every configuration
    /// error found. Duplicate expression ids keep the first definition.
    pub fn build(
        expressions: Vec<IdentityExpression>,
        identities: &HashSet<IdentityId>,
    ) -> (Self, Vec<ConfigurationError>) {
        let mut errors = Vec::new();
        let mut nodes: HashMap<ExpressionId, Node> = HashMap::with_capacity(expressions.len());

        for expression in expressions {
            if nodes.contains_key(&expression.id) {
                errors.push(ConfigurationError::DuplicateId {
                    kind: "expression",
                    id: expression.id.into(),
                });
                continue;
            }
            nodes.insert(
                expression.id,
                Node {
                    expression,
                    defect: None,
                    members: OnceLock::new(),
                },
            );
        }

        // Local checks: dangling edges quarantine, repeated targets only warn.
        let known: HashSet<ExpressionId> = nodes.keys().copied().collect();
        let mut repeated = Vec::new();
        for node in nodes.values_mut() {
            repeated.extend(repeated_edges(&node.expression));
            if let Some(defect) = dangling_edge(&node.expression, &known, identities) {
                errors.push(defect.clone());
                node.defect = Some(defect);
            }
        }
        repeated.sort_unstable_by_key(|r| r.expression);
        for r in &repeated {
            warn!(
                expression = %r.expression,
                target = %r.target,
                "Expression has more than one edge to the same target"
            );
        }

        let mut graph = Self { nodes, repeated };
        graph.quarantine_cycles_and_dependents(&mut errors);
        (graph, errors)
    }

    /// Depth-first walk in id order on an explicit stack. A back edge marks
    /// every node on the cycle, a node nested deeper than
    /// [`MAX_EXPRESSION_DEPTH`] is too deep, and a node whose child is
    /// defective inherits a defect.
    fn quarantine_cycles_and_dependents(&mut self, errors: &mut Vec<ConfigurationError>) {
        let mut ids: Vec<ExpressionId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();

        let mut marks: HashMap<ExpressionId, Mark> = HashMap::with_capacity(ids.len());
        let mut depths: HashMap<ExpressionId, usize> = HashMap::with_capacity(ids.len());
        let mut frames: Vec<Frame> = Vec::new();

        for root in ids {
            if marks.contains_key(&root) {
                continue;
            }
            marks.insert(root, Mark::Visiting);
            frames.push(self.frame(root));

            while let Some(frame) = frames.last_mut() {
                let id = frame.id;

                if let Some(&child) = frame.children.get(frame.next) {
                    frame.next += 1;
                    match marks.get(&child) {
                        Some(Mark::Visiting) => {
                            let start = frames.iter().position(|f| f.id == child).unwrap_or(0);
                            let mut path: Vec<ExpressionId> =
                                frames[start..].iter().map(|f| f.id).collect();
                            path.push(child);
                            let error = ConfigurationError::CyclicExpression { path: path.clone() };
                            errors.push(error.clone());
                            for member in &path {
                                self.set_defect(*member, error.clone());
                            }
                        }
                        Some(Mark::Done) => self.inherit_defect(id, child, errors),
                        None => {
                            marks.insert(child, Mark::Visiting);
                            frames.push(self.frame(child));
                        }
                    }
                    continue;
                }

                let depth = 1 + frame
                    .children
                    .iter()
                    .filter_map(|child| depths.get(child))
                    .max()
                    .copied()
                    .unwrap_or(0);
                depths.insert(id, depth);
                if depth > MAX_EXPRESSION_DEPTH && self.nodes[&id].defect.is_none() {
                    let error = ConfigurationError::ExpressionTooDeep {
                        expression: id,
                        limit: MAX_EXPRESSION_DEPTH,
                    };
                    errors.push(error.clone());
                    self.set_defect(id, error);
                }

                frames.pop();
                marks.insert(id, Mark::Done);
                if let Some(parent) = frames.last() {
                    self.inherit_defect(parent.id, id, errors);
                }
            }
        }
    }

    fn frame(&self, id: ExpressionId) -> Frame {
        let children = self.nodes[&id]
            .expression
            .edges
            .iter()
            .filter_map(|edge| match edge.target {
                EdgeTarget::Expression(child) if self.nodes.contains_key(&child) => Some(child),
                _ => None,
            })
            .collect();
        Frame {
            id,
            children,
            next: 0,
        }
    }

    fn inherit_defect(
        &mut self,
        id: ExpressionId,
        child: ExpressionId,
        errors: &mut Vec<ConfigurationError>,
    ) {
        if self.nodes[&id].defect.is_none() && self.nodes[&child].defect.is_some() {
            let error = ConfigurationError::DependsOnQuarantined {
                expression: id,
                dependency: child,
            };
            errors.push(error.clone());
            self.set_defect(id, error);
        }
    }

    fn set_defect(&mut self, id: ExpressionId, error: ConfigurationError) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.defect.get_or_insert(error);
        }
    }

    /// Returns the expression definition.
    pub fn get(&self, id: ExpressionId) -> Option<&IdentityExpression> {
        self.nodes.get(&id).map(|node| &node.expression)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Expressions that name one target in several edges, by expression id.
    pub fn repeated_edges(&self) -> &[RepeatedEdge] {
        &self.repeated
    }

    /// Returns `Ok(())` if the expression exists and is not quarantined.
    pub fn check(&self, id: ExpressionId) -> Result<(), ConfigurationError> {
        self.node(id).map(|_| ())
    }

    fn node(&self, id: ExpressionId) -> Result<&Node, ConfigurationError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or(ConfigurationError::DanglingEdge {
                expression: id,
                target: EdgeTarget::Expression(id),
            })?;
        match &node.defect {
            Some(defect) => Err(defect.clone()),
            None => Ok(node),
        }
    }

    /// Returns the full member set of an expression, computing and caching
    /// it on first use.
    ///
    /// Safe to call from many threads at once. Racing first calls may each
    /// compute the set; only one result is kept and all are identical.
    pub fn members(&self, id: ExpressionId) -> Result<Arc<IdentitySet>, ConfigurationError> {
        let node = self.node(id)?;
        if let Some(cached) = node.members.get() {
            return Ok(Arc::clone(cached));
        }

        let mut set = IdentitySet::new();
        for edge in &node.expression.edges {
            match (edge.op, edge.target) {
                (EdgeOp::Include, EdgeTarget::Identity(identity)) => {
                    set.insert(identity);
                }
                (EdgeOp::Exclude, EdgeTarget::Identity(identity)) => {
                    set.remove(&identity);
                }
                (EdgeOp::Include, EdgeTarget::Expression(child)) => {
                    set.extend(self.members(child)?.iter().copied());
                }
                (EdgeOp::Exclude, EdgeTarget::Expression(child)) => {
                    let child = self.members(child)?;
                    set.retain(|identity| !child.contains(identity));
                }
            }
        }

        let computed = Arc::new(set);
        // Losing the race is fine: the winner computed the same set.
        let _ = node.members.set(Arc::clone(&computed));
        Ok(node.members.get().map_or(computed, Arc::clone))
    }

    /// Tests membership of a single identity without materializing sets.
    ///
    /// Walks the same edges in the same order as [`members`](Self::members):
    /// each edge that touches `identity` overwrites the verdict of the edges
    /// before it, so a later exclude beats an earlier include and vice versa.
    pub fn contains(
        &self,
        id: ExpressionId,
        identity: IdentityId,
    ) -> Result<bool, ConfigurationError> {
        let mut memo = HashMap::new();
        self.contains_memo(id, identity, &mut memo)
    }

    fn contains_memo(
        &self,
        id: ExpressionId,
        identity: IdentityId,
        memo: &mut HashMap<ExpressionId, bool>,
    ) -> Result<bool, ConfigurationError> {
        if let Some(known) = memo.get(&id) {
            return Ok(*known);
        }

        let node = self.node(id)?;
        let mut inside = false;
        for edge in &node.expression.edges {
            let touches = match edge.target {
                EdgeTarget::Identity(leaf) => leaf == identity,
                EdgeTarget::Expression(child) => self.contains_memo(child, identity, memo)?,
            };
            if touches {
                inside = edge.op == EdgeOp::Include;
            }
        }

        memo.insert(id, inside);
        Ok(inside)
    }

    /// Membership test used by the resolver. Served from the member cache.
    pub fn matches(
        &self,
        id: ExpressionId,
        identity: IdentityId,
    ) -> Result<bool, ConfigurationError> {
        Ok(self.members(id)?.contains(&identity))
    }
}

fn repeated_edges(expression: &IdentityExpression) -> Vec<RepeatedEdge> {
    let mut seen = HashSet::with_capacity(expression.edges.len());
    let mut reported = HashSet::new();
    expression
        .edges
        .iter()
        .filter(|edge| !seen.insert(edge.target) && reported.insert(edge.target))
        .map(|edge| RepeatedEdge {
            expression: expression.id,
            target: edge.target,
        })
        .collect()
}

fn dangling_edge(
    expression: &IdentityExpression,
    expressions: &HashSet<ExpressionId>,
    identities: &HashSet<IdentityId>,
) -> Option<ConfigurationError> {
    expression
        .edges
        .iter()
        .find(|edge| match edge.target {
            EdgeTarget::Identity(id) => !identities.contains(&id),
            EdgeTarget::Expression(id) => !expressions.contains(&id),
        })
        .map(|edge| ConfigurationError::DanglingEdge {
            expression: expression.id,
            target: edge.target,
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ident(id: u64) -> IdentityId {
        IdentityId::new(id)
    }

    fn expr(id: u64) -> ExpressionId {
        ExpressionId::new(id)
    }

    fn identities(ids: &[u64]) -> HashSet<IdentityId> {
        ids.iter().copied().map(IdentityId::new).collect()
    }

    fn graph(expressions: Vec<IdentityExpression>) -> ExpressionGraph {
        let (graph, errors) = ExpressionGraph::build(expressions, &identities(&[1, 2, 3, 4]));
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        graph
    }

    /// Asserts both strategies agree and returns the shared answer.
    fn both(graph: &ExpressionGraph, id: ExpressionId, identity: IdentityId) -> bool {
        let materialized = graph.matches(id, identity).unwrap();
        let direct = graph.contains(id, identity).unwrap();
        assert_eq!(materialized, direct, "strategies disagree");
        materialized
    }

    #[test]
    fn empty_expression_is_empty_set() {
        let g = graph(vec![IdentityExpression::new(expr(1), "nobody")]);
        for i in 1..=4 {
            assert!(!both(&g, expr(1), ident(i)));
        }
        assert!(g.members(expr(1)).unwrap().is_empty());
    }

    #[test]
    fn include_then_exclude_reduces_to_empty() {
        let g = graph(vec![
            IdentityExpression::new(expr(1), "cancelled")
                .with_edge(Edge::include_identity(ident(1)))
                .with_edge(Edge::exclude_identity(ident(2)))
                .with_edge(Edge::exclude_identity(ident(1))),
        ]);
        assert!(!both(&g, expr(1), ident(1)));
        assert!(!both(&g, expr(1), ident(2)));
        assert!(!both(&g, expr(1), ident(3)));
    }

    #[test]
    fn edge_order_matters_for_child_exclusion() {
        let g = graph(vec![
            IdentityExpression::new(expr(10), "just-a").with_edge(Edge::include_identity(ident(1))),
            IdentityExpression::new(expr(1), "include-then-exclude")
                .with_edge(Edge::include_identity(ident(1)))
                .with_edge(Edge::exclude_expression(expr(10))),
            IdentityExpression::new(expr(2), "exclude-then-include")
                .with_edge(Edge::exclude_expression(expr(10)))
                .with_edge(Edge::include_identity(ident(1))),
        ]);

        assert!(!both(&g, expr(1), ident(1)));
        assert!(both(&g, expr(2), ident(1)));
    }

    #[test]
    fn union_and_difference_of_children() {
        let g = graph(vec![
            IdentityExpression::new(expr(10), "staff")
                .with_edge(Edge::include_identity(ident(1)))
                .with_edge(Edge::include_identity(ident(2))),
            IdentityExpression::new(expr(11), "students")
                .with_edge(Edge::include_identity(ident(3)))
                .with_edge(Edge::include_identity(ident(4))),
            IdentityExpression::new(expr(12), "suspended")
                .with_edge(Edge::include_identity(ident(2))),
            IdentityExpression::new(expr(1), "everyone-in-good-standing")
                .with_edge(Edge::include_expression(expr(10)))
                .with_edge(Edge::include_expression(expr(11)))
                .with_edge(Edge::exclude_expression(expr(12))),
        ]);

        let members = g.members(expr(1)).unwrap();
        assert_eq!(
            members.iter().copied().collect::<Vec<_>>(),
            vec![ident(1), ident(3), ident(4)]
        );
        assert!(!both(&g, expr(1), ident(2)));
    }

    #[test]
    fn exclude_from_empty_running_set_is_noop() {
        let g = graph(vec![
            IdentityExpression::new(expr(10), "a").with_edge(Edge::include_identity(ident(1))),
            IdentityExpression::new(expr(1), "nothing-left")
                .with_edge(Edge::exclude_expression(expr(10))),
        ]);
        assert!(!both(&g, expr(1), ident(1)));
    }

    #[test]
    fn shared_child_in_diamond() {
        let g = graph(vec![
            IdentityExpression::new(expr(4), "base").with_edge(Edge::include_identity(ident(1))),
            IdentityExpression::new(expr(2), "left").with_edge(Edge::include_expression(expr(4))),
            IdentityExpression::new(expr(3), "right").with_edge(Edge::exclude_expression(expr(4))),
            IdentityExpression::new(expr(1), "top")
                .with_edge(Edge::include_expression(expr(2)))
                .with_edge(Edge::include_expression(expr(3))),
        ]);
        // right is empty, so the union with left keeps identity 1.
        assert!(both(&g, expr(1), ident(1)));
    }

    #[test]
    fn members_are_cached() {
        let g = graph(vec![
            IdentityExpression::new(expr(1), "a").with_edge(Edge::include_identity(ident(1))),
        ]);
        let first = g.members(expr(1)).unwrap();
        let second = g.members(expr(1)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_first_use_yields_one_set() {
        let g = Arc::new(graph(vec![
            IdentityExpression::new(expr(1), "a")
                .with_edge(Edge::include_identity(ident(1)))
                .with_edge(Edge::include_identity(ident(3))),
        ]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                std::thread::spawn(move || g.members(expr(1)).unwrap())
            })
            .collect();

        for handle in handles {
            let set = handle.join().unwrap();
            assert_eq!(set.len(), 2);
        }
    }

    #[test]
    fn self_loop_is_quarantined() {
        let (g, errors) = ExpressionGraph::build(
            vec![
                IdentityExpression::new(expr(1), "loop")
                    .with_edge(Edge::include_expression(expr(1))),
            ],
            &identities(&[]),
        );
        assert!(matches!(
            errors.as_slice(),
            [ConfigurationError::CyclicExpression { path }] if path == &vec![expr(1), expr(1)]
        ));
        assert!(g.members(expr(1)).is_err());
        assert!(g.contains(expr(1), ident(1)).is_err());
    }

    #[test]
    fn cycle_quarantines_members_and_dependents_only() {
        let (g, errors) = ExpressionGraph::build(
            vec![
                IdentityExpression::new(expr(1), "a").with_edge(Edge::include_expression(expr(2))),
                IdentityExpression::new(expr(2), "b").with_edge(Edge::include_expression(expr(1))),
                IdentityExpression::new(expr(3), "uses-a")
                    .with_edge(Edge::include_expression(expr(1))),
                IdentityExpression::new(expr(4), "healthy")
                    .with_edge(Edge::include_identity(ident(1))),
            ],
            &identities(&[1]),
        );

        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ConfigurationError::CyclicExpression { .. }))
        );
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigurationError::DependsOnQuarantined { expression, .. } if *expression == expr(3)
        )));

        assert!(g.check(expr(1)).is_err());
        assert!(g.check(expr(2)).is_err());
        assert!(g.check(expr(3)).is_err());
        assert!(g.matches(expr(4), ident(1)).unwrap());
    }

    #[test]
    fn repeated_target_is_reported_but_still_folded() {
        let (g, errors) = ExpressionGraph::build(
            vec![
                IdentityExpression::new(expr(1), "dup")
                    .with_edge(Edge::include_identity(ident(1)))
                    .with_edge(Edge::exclude_identity(ident(1)))
                    .with_edge(Edge::include_identity(ident(1))),
            ],
            &identities(&[1]),
        );
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(
            g.repeated_edges(),
            &[RepeatedEdge {
                expression: expr(1),
                target: EdgeTarget::Identity(ident(1)),
            }]
        );
        assert!(g.check(expr(1)).is_ok());
        assert!(both(&g, expr(1), ident(1)));
    }

    #[test]
    fn include_exclude_same_identity_then_exclude_other_is_empty() {
        // a = 1, b = 2, c = 3: E = +a, -a, -b
        let (g, errors) = ExpressionGraph::build(
            vec![
                IdentityExpression::new(expr(1), "e")
                    .with_edge(Edge::include_identity(ident(1)))
                    .with_edge(Edge::exclude_identity(ident(1)))
                    .with_edge(Edge::exclude_identity(ident(2))),
            ],
            &identities(&[1, 2, 3]),
        );
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(g.matches(expr(1), ident(1)), Ok(false));
        assert_eq!(g.matches(expr(1), ident(2)), Ok(false));
        assert_eq!(g.matches(expr(1), ident(3)), Ok(false));
        assert!(g.members(expr(1)).unwrap().is_empty());
    }

    /// Chain where expression `n` includes `n + 1` and the last one holds identity 1.
    fn chain(len: u64) -> Vec<IdentityExpression> {
        (1..=len)
            .map(|n| {
                let expression = IdentityExpression::new(expr(n), "link");
                if n == len {
                    expression.with_edge(Edge::include_identity(ident(1)))
                } else {
                    expression.with_edge(Edge::include_expression(expr(n + 1)))
                }
            })
            .collect()
    }

    #[test]
    fn chain_at_depth_limit_evaluates() {
        let g = graph(chain(MAX_EXPRESSION_DEPTH as u64));
        assert!(both(&g, expr(1), ident(1)));
    }

    #[test]
    fn chain_past_depth_limit_quarantines_outer_links() {
        let len = MAX_EXPRESSION_DEPTH as u64 + 10;
        let (g, errors) = ExpressionGraph::build(chain(len), &identities(&[1]));

        // Link n has depth len - n + 1, so the first too-deep link is n = 10.
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigurationError::ExpressionTooDeep { expression, .. } if *expression == expr(10)
        )));
        assert!(g.check(expr(1)).is_err());
        assert!(g.check(expr(10)).is_err());
        assert!(g.matches(expr(11), ident(1)).unwrap());
    }

    #[test]
    fn very_long_chain_builds_without_recursion() {
        let (g, errors) = ExpressionGraph::build(chain(50_000), &identities(&[1]));
        assert!(!errors.is_empty());
        assert!(g.check(expr(1)).is_err());
        assert!(g.matches(expr(50_000), ident(1)).unwrap());
    }

    #[test]
    fn dangling_edges_are_defects() {
        let (g, errors) = ExpressionGraph::build(
            vec![
                IdentityExpression::new(expr(1), "ghost-identity")
                    .with_edge(Edge::include_identity(ident(99))),
                IdentityExpression::new(expr(2), "ghost-child")
                    .with_edge(Edge::include_expression(expr(99))),
            ],
            &identities(&[1]),
        );
        assert_eq!(errors.len(), 2);
        assert!(g.check(expr(1)).is_err());
        assert!(g.check(expr(2)).is_err());
    }

    #[test]
    fn unknown_expression_is_an_error() {
        let g = graph(vec![]);
        assert!(g.matches(expr(5), ident(1)).is_err());
    }

    // ------------------------------------------------------------------------
    // Property tests
    // ------------------------------------------------------------------------

    /// Random DAG: expression `n` may only point at expressions `< n`.
    /// Targets may repeat within one expression.
    fn arb_dag() -> impl Strategy<Value = Vec<IdentityExpression>> {
        proptest::collection::vec(
            proptest::collection::vec((any::<bool>(), any::<bool>(), 0u64..6), 0..6),
            1..8,
        )
        .prop_map(|layers| {
            layers
                .into_iter()
                .enumerate()
                .map(|(n, raw_edges)| {
                    let n = n as u64;
                    let mut expression = IdentityExpression::new(expr(n), "generated");
                    for (include, to_child, target) in raw_edges {
                        let target = if to_child && n > 0 {
                            EdgeTarget::Expression(expr(target % n))
                        } else {
                            EdgeTarget::Identity(ident(target))
                        };
                        let op = if include { EdgeOp::Include } else { EdgeOp::Exclude };
                        expression.edges.push(Edge { op, target });
                    }
                    expression
                })
                .collect()
        })
    }

    proptest! {
        /// Property: materialization and direct membership always agree
        #[test]
        fn prop_strategies_agree(dag in arb_dag(), probe in 0u64..6) {
            let count = dag.len() as u64;
            let (g, errors) = ExpressionGraph::build(dag, &identities(&[0, 1, 2, 3, 4, 5]));
            prop_assert!(errors.is_empty());

            for n in 0..count {
                let materialized = g.matches(expr(n), ident(probe)).unwrap();
                let direct = g.contains(expr(n), ident(probe)).unwrap();
                prop_assert_eq!(materialized, direct);
            }
        }
    }
}
