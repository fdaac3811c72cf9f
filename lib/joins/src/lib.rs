mod multiway;
mod nested_loop;
mod symmetric_hash;
#[cfg(test)]
pub(crate) mod test_support;

pub use multiway::MultiwayJoinActor;
pub use nested_loop::NestedLoopJoinActor;
pub use symmetric_hash::SymmetricHashJoinActor;

use rdf_relay_api::{
    Actor, EngineView, JoinAction, QueryContext, ResolvedBindings,
};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{Bindings, Term, Variable};
use std::sync::Arc;

/// The join actors in subscription order. Ties under minimum-iterations
/// mediation favor earlier actors.
pub fn default_actors() -> Vec<Arc<dyn Actor<JoinAction>>> {
    vec![
        Arc::new(SymmetricHashJoinActor),
        Arc::new(NestedLoopJoinActor),
        Arc::new(MultiwayJoinActor),
    ]
}

/// Entry point for joining resolved entries.
///
/// The degenerate cases never reach the bus: zero entries yield the empty
/// stream over no variables, a single entry is returned verbatim. Everything
/// else is dispatched to the join mediator.
pub async fn mediate_join(
    entries: Vec<ResolvedBindings>,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    match entries.len() {
        0 => Ok(ResolvedBindings::empty(Arc::new([]))),
        1 => {
            let mut entries = entries;
            Ok(entries.remove(0))
        }
        _ => view.joins.mediate(JoinAction { entries }, ctx, view).await,
    }
}

/// The projection of a bindings over the join variables, used as a hash key.
///
/// `None` when a join variable is unbound in this solution (possible below
/// unions and optionals); such solutions are compatible with any key and are
/// handled out of band by the hash join.
pub(crate) fn join_key(bindings: &Bindings, shared: &[Variable]) -> Option<Vec<Term>> {
    shared
        .iter()
        .map(|variable| bindings.get(variable).cloned())
        .collect()
}
