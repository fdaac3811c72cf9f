use crate::expression::{order_terms, ExpressionEvaluator};
use async_trait::async_trait;
use futures::TryStreamExt;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::Term;
use spargebra::algebra::{GraphPattern, OrderExpression};
use std::cmp::Ordering;
use std::sync::Arc;

/// `ORDER BY`: a blocking operator. The input is materialized, every
/// comparator key is evaluated, and the solutions are stably sorted by each
/// comparator in declared order, ties broken by the next.
pub struct OrderByOperator;

#[async_trait]
impl Actor<OperationAction> for OrderByOperator {
    fn name(&self) -> &'static str {
        "operator-orderby"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "orderby" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not an orderby node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::OrderBy { inner, expression } = action.operation else {
            return EngineError::internal("orderby operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let variables = Arc::clone(resolved.variables());
        let solutions: Vec<_> = resolved.stream.try_collect().await?;

        let evaluator = ExpressionEvaluator::new(ctx.clone(), view.clone());
        let mut keyed = Vec::with_capacity(solutions.len());
        for bindings in solutions {
            let mut keys: Vec<Option<Term>> = Vec::with_capacity(expression.len());
            for comparator in &expression {
                let expr = match comparator {
                    OrderExpression::Asc(expr) | OrderExpression::Desc(expr) => expr,
                };
                keys.push(evaluator.evaluate(expr, &bindings).await);
            }
            keyed.push((keys, bindings));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (i, comparator) in expression.iter().enumerate() {
                let ordering = order_terms(a[i].as_ref(), b[i].as_ref());
                let ordering = match comparator {
                    OrderExpression::Asc(_) => ordering,
                    OrderExpression::Desc(_) => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(ResolvedBindings::from_solutions(
            variables,
            keyed.into_iter().map(|(_, bindings)| bindings).collect(),
        ))
    }
}
