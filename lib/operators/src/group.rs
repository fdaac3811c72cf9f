use crate::expression::{numeric, order_terms, ExpressionEvaluator, Numeric};
use async_trait::async_trait;
use futures::TryStreamExt;
use itertools::Itertools;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Literal, Term, Variable};
use rustc_hash::{FxHashMap, FxHashSet};
use spargebra::algebra::{AggregateExpression, AggregateFunction, GraphPattern};
use std::sync::Arc;

/// `GROUP BY` with aggregates: a blocking operator. Solutions are hashed by
/// the projection over the grouping variables; each group then evaluates its
/// aggregates. Without grouping variables there is exactly one group, even
/// over an empty input.
pub struct GroupOperator;

#[async_trait]
impl Actor<OperationAction> for GroupOperator {
    fn name(&self) -> &'static str {
        "operator-group"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "group" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a group node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } = action.operation
        else {
            return EngineError::internal("group operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let solutions: Vec<_> = resolved.stream.try_collect().await?;

        // Group, preserving first-seen order of the keys.
        let mut order: Vec<Vec<Option<Term>>> = Vec::new();
        let mut groups: FxHashMap<Vec<Option<Term>>, Vec<Bindings>> = FxHashMap::default();
        for bindings in solutions {
            let key: Vec<Option<Term>> = variables
                .iter()
                .map(|variable| bindings.get(variable).cloned())
                .collect();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(bindings);
        }
        if variables.is_empty() && order.is_empty() {
            // Aggregates over nothing still produce one solution.
            order.push(Vec::new());
            groups.insert(Vec::new(), Vec::new());
        }

        let evaluator = ExpressionEvaluator::new(ctx.clone(), view.clone());
        let mut out_variables: Vec<Variable> = variables.clone();
        for (variable, _) in &aggregates {
            if !out_variables.contains(variable) {
                out_variables.push(variable.clone());
            }
        }

        let mut out = Vec::with_capacity(order.len());
        for key in order {
            let members = groups.remove(&key).unwrap_or_default();
            let mut bindings = Bindings::new();
            for (variable, term) in variables.iter().zip(&key) {
                if let Some(term) = term {
                    bindings = bindings.bind(variable.clone(), term.clone());
                }
            }
            for (variable, aggregate) in &aggregates {
                if let Some(term) = evaluate_aggregate(&evaluator, aggregate, &members).await {
                    bindings = bindings.bind(variable.clone(), term);
                }
            }
            out.push(bindings);
        }
        Ok(ResolvedBindings::from_solutions(out_variables.into(), out))
    }
}

async fn evaluate_aggregate(
    evaluator: &Arc<ExpressionEvaluator>,
    aggregate: &AggregateExpression,
    members: &[Bindings],
) -> Option<Term> {
    match aggregate {
        AggregateExpression::CountSolutions { distinct } => {
            let count = if *distinct {
                members.iter().collect::<FxHashSet<_>>().len()
            } else {
                members.len()
            };
            Some(Literal::from(count as i64).into())
        }
        AggregateExpression::FunctionCall {
            name,
            expr,
            distinct,
        } => {
            let mut values = Vec::new();
            for member in members {
                if let Some(term) = evaluator.evaluate(expr, member).await {
                    values.push(term);
                }
            }
            if *distinct {
                let mut seen = Vec::new();
                values.retain(|term| {
                    if seen.contains(term) {
                        false
                    } else {
                        seen.push(term.clone());
                        true
                    }
                });
            }
            apply_aggregate_function(name, values)
        }
    }
}

fn apply_aggregate_function(name: &AggregateFunction, values: Vec<Term>) -> Option<Term> {
    match name {
        AggregateFunction::Count => Some(Literal::from(values.len() as i64).into()),
        AggregateFunction::Sum => sum(&values).map(Numeric::into_term),
        AggregateFunction::Avg => {
            if values.is_empty() {
                return Some(Literal::from(0).into());
            }
            let total = sum(&values)?;
            Some(Literal::from(total.as_double() / values.len() as f64).into())
        }
        AggregateFunction::Min => values
            .iter()
            .min_by(|a, b| order_terms(Some(a), Some(b)))
            .cloned(),
        AggregateFunction::Max => values
            .iter()
            .max_by(|a, b| order_terms(Some(a), Some(b)))
            .cloned(),
        AggregateFunction::Sample => values.into_iter().next(),
        AggregateFunction::GroupConcat { separator } => {
            let separator = separator.as_deref().unwrap_or(" ");
            let joined = values
                .iter()
                .filter_map(|term| match term {
                    Term::Literal(l) => Some(l.value()),
                    _ => None,
                })
                .join(separator);
            Some(Literal::new_simple_literal(joined).into())
        }
        // Custom aggregates are an evaluation error: the variable stays
        // unbound.
        _ => None,
    }
}

fn sum(values: &[Term]) -> Option<Numeric> {
    values.iter().try_fold(Numeric::Integer(0), |total, term| {
        let n = numeric(term)?;
        total.add(n)
    })
}
