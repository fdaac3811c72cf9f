use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_streams::SliceStream;
use spargebra::algebra::GraphPattern;

/// `OFFSET` / `LIMIT`: drops the first `start` solutions and emits at most
/// `length` of the remainder. The reported cardinality follows
/// `max(0, min(length, child − start))`.
pub struct SliceOperator;

#[async_trait]
impl Actor<OperationAction> for SliceOperator {
    fn name(&self) -> &'static str {
        "operator-slice"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "slice" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a slice node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Slice {
            inner,
            start,
            length,
        } = action.operation
        else {
            return EngineError::internal("slice operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let cardinality = resolved
            .cardinality
            .slice(start as u64, length.map(|l| l as u64));
        Ok(ResolvedBindings::new(
            Box::pin(SliceStream::new(
                resolved.stream,
                start as u64,
                length.map(|l| l as u64),
            )),
            cardinality,
        ))
    }
}
