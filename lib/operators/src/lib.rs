mod bgp;
mod distinct;
mod expression;
mod extend;
mod filter;
mod graph;
mod group;
mod join;
mod leftjoin;
mod minus;
mod orderby;
mod path;
mod project;
mod service;
mod slice;
mod union;
mod values;

pub use expression::ExpressionEvaluator;

pub use bgp::BgpOperator;
pub use distinct::{DistinctOperator, ReducedOperator};
pub use extend::ExtendOperator;
pub use filter::FilterOperator;
pub use graph::GraphOperator;
pub use group::GroupOperator;
pub use join::JoinOperator;
pub use leftjoin::LeftJoinOperator;
pub use minus::MinusOperator;
pub use orderby::OrderByOperator;
pub use path::PathOperator;
pub use project::ProjectOperator;
pub use service::ServiceOperator;
pub use slice::SliceOperator;
pub use union::UnionOperator;
pub use values::ValuesOperator;

use rdf_relay_api::{Actor, OperationAction};
use std::sync::Arc;

/// One operator actor per algebra node tag. Each `test` passes iff the
/// action's node matches its tag, so dispatch runs under the first-match
/// policy.
pub fn default_actors() -> Vec<Arc<dyn Actor<OperationAction>>> {
    vec![
        Arc::new(BgpOperator),
        Arc::new(PathOperator),
        Arc::new(JoinOperator),
        Arc::new(LeftJoinOperator),
        Arc::new(FilterOperator),
        Arc::new(UnionOperator),
        Arc::new(GraphOperator),
        Arc::new(ExtendOperator),
        Arc::new(MinusOperator),
        Arc::new(ValuesOperator),
        Arc::new(OrderByOperator),
        Arc::new(ProjectOperator),
        Arc::new(DistinctOperator),
        Arc::new(ReducedOperator),
        Arc::new(SliceOperator),
        Arc::new(GroupOperator),
        Arc::new(ServiceOperator),
    ]
}
