use crate::BusAction;
use rdf_relay_common::Cardinality;
use rdf_relay_model::{Bindings, QuadPattern, Variable};
use rdf_relay_streams::{from_solutions, SendableBindingsStream, SendableQuadStream};
use spargebra::algebra::GraphPattern;
use std::sync::Arc;

/// The action of the query-operation bus: evaluate one algebra node.
///
/// Operator actors dispatch on the node tag; the node's children are carried
/// inside the tree and mediated recursively by the running operator.
pub struct OperationAction {
    pub operation: GraphPattern,
}

impl OperationAction {
    pub fn new(operation: GraphPattern) -> Self {
        Self { operation }
    }
}

impl BusAction for OperationAction {
    type Output = ResolvedBindings;

    fn kind(&self) -> &'static str {
        operation_kind(&self.operation)
    }
}

/// The tag of an algebra node, as used for operator dispatch.
pub fn operation_kind(operation: &GraphPattern) -> &'static str {
    match operation {
        GraphPattern::Bgp { .. } => "bgp",
        GraphPattern::Path { .. } => "path",
        GraphPattern::Join { .. } => "join",
        GraphPattern::LeftJoin { .. } => "leftjoin",
        GraphPattern::Filter { .. } => "filter",
        GraphPattern::Union { .. } => "union",
        GraphPattern::Graph { .. } => "graph",
        GraphPattern::Extend { .. } => "extend",
        GraphPattern::Minus { .. } => "minus",
        GraphPattern::Values { .. } => "values",
        GraphPattern::OrderBy { .. } => "orderby",
        GraphPattern::Project { .. } => "project",
        GraphPattern::Distinct { .. } => "distinct",
        GraphPattern::Reduced { .. } => "reduced",
        GraphPattern::Slice { .. } => "slice",
        GraphPattern::Group { .. } => "group",
        GraphPattern::Service { .. } => "service",
    }
}

/// A resolved query operation: the solution stream plus its cardinality
/// estimate.
///
/// The estimate is available before the stream is consumed, which is what
/// lets the join mediator cost its actors at `test` time.
pub struct ResolvedBindings {
    pub stream: SendableBindingsStream,
    pub cardinality: Cardinality,
}

impl ResolvedBindings {
    pub fn new(stream: SendableBindingsStream, cardinality: Cardinality) -> Self {
        Self {
            stream,
            cardinality,
        }
    }

    /// An empty result over the given variables.
    pub fn empty(variables: Arc<[Variable]>) -> Self {
        Self {
            stream: rdf_relay_streams::empty(variables),
            cardinality: Cardinality::EMPTY,
        }
    }

    /// A result over materialized solutions, with exact cardinality.
    pub fn from_solutions(variables: Arc<[Variable]>, solutions: Vec<Bindings>) -> Self {
        let cardinality = Cardinality::from(solutions.len());
        Self {
            stream: from_solutions(variables, solutions),
            cardinality,
        }
    }

    pub fn variables(&self) -> &Arc<[Variable]> {
        self.stream.variables()
    }
}

/// The action of the quad-pattern bus: resolve one pattern against the
/// context's source(s).
pub struct QuadPatternAction {
    pub pattern: QuadPattern,
}

impl QuadPatternAction {
    pub fn new(pattern: QuadPattern) -> Self {
        Self { pattern }
    }
}

impl BusAction for QuadPatternAction {
    type Output = ResolvedQuads;

    fn kind(&self) -> &'static str {
        "quad-pattern"
    }
}

/// A resolved quad pattern: the quad stream plus its cardinality estimate.
pub struct ResolvedQuads {
    pub stream: SendableQuadStream,
    pub cardinality: Cardinality,
}

/// The action of the join bus: join the given resolved entries.
///
/// Zero and one entries never reach the bus; the join entry point
/// short-circuits them before dispatch.
pub struct JoinAction {
    pub entries: Vec<ResolvedBindings>,
}

impl BusAction for JoinAction {
    type Output = ResolvedBindings;

    fn kind(&self) -> &'static str {
        "join"
    }
}

impl JoinAction {
    /// The shared variables of all entries, i.e. the join key.
    pub fn shared_variables(&self) -> Vec<Variable> {
        let Some(first) = self.entries.first() else {
            return Vec::new();
        };
        first
            .variables()
            .iter()
            .filter(|variable| {
                self.entries[1..]
                    .iter()
                    .all(|entry| entry.variables().contains(variable))
            })
            .cloned()
            .collect()
    }

    /// The union of all entries' variables, in first-seen order.
    pub fn joined_variables(&self) -> Arc<[Variable]> {
        let mut variables: Vec<Variable> = Vec::new();
        for entry in &self.entries {
            for variable in entry.variables().iter() {
                if !variables.contains(variable) {
                    variables.push(variable.clone());
                }
            }
        }
        variables.into()
    }
}
