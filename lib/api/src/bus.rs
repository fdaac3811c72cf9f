use crate::{Actor, BusAction, QueryContext, TestOutcome};
use std::sync::Arc;

/// A named capability with an ordered set of subscribed actors.
///
/// Buses are populated during engine wiring and read-only afterwards, so no
/// locking is involved at query time. The bus owns its actors; mediators hold
/// a shared reference to the bus plus a policy, keeping ownership acyclic.
pub struct Bus<A: BusAction> {
    name: &'static str,
    actors: Vec<Arc<dyn Actor<A>>>,
}

impl<A: BusAction> Bus<A> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            actors: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribes an actor. Subscription order is significant: mediation
    /// policies break ties in favor of earlier actors.
    pub fn subscribe(&mut self, actor: Arc<dyn Actor<A>>) -> &mut Self {
        self.actors.push(actor);
        self
    }

    pub fn actors(&self) -> &[Arc<dyn Actor<A>>] {
        &self.actors
    }

    /// Publishes an action: every actor's pending `test` reply, in
    /// subscription order.
    pub fn publish<'a>(
        &'a self,
        action: &'a A,
        ctx: &'a QueryContext,
    ) -> impl Iterator<Item = (&'a Arc<dyn Actor<A>>, TestOutcome)> + 'a {
        self.actors
            .iter()
            .map(move |actor| (actor, actor.test(action, ctx)))
    }
}
