use crate::{Actor, Bus, BusAction, EngineView, QueryContext, TestMetric, TestOutcome};
use rdf_relay_common::{EngineError, EngineResult};
use std::sync::Arc;
use std::time::Duration;

/// How a mediator ranks the actors that passed their `test`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediationPolicy {
    /// The first passing actor in subscription order wins. Used on buses
    /// where at most one actor passes per action (operator dispatch by tag).
    First,
    /// The smallest estimated iteration count wins; unknown estimates sort
    /// last. The join bus runs under this policy.
    MinimumIterations,
    /// The smallest time estimate wins; actors without one sort last.
    MinimumTime,
    /// The largest priority weight wins.
    MaximumPriority,
}

/// Selects and runs one actor from a bus for each mediated action.
pub struct Mediator<A: BusAction> {
    bus: Arc<Bus<A>>,
    policy: MediationPolicy,
}

impl<A: BusAction> Mediator<A> {
    pub fn new(bus: Arc<Bus<A>>, policy: MediationPolicy) -> Self {
        Self { bus, policy }
    }

    pub fn bus(&self) -> &Bus<A> {
        &self.bus
    }

    /// Awaits all `test` replies, drops the rejections, applies the policy
    /// and runs the winner.
    pub async fn mediate(
        &self,
        action: A,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<A::Output> {
        let mut winner: Option<(Arc<dyn Actor<A>>, TestMetric)> = None;
        for (actor, outcome) in self.bus.publish(&action, ctx) {
            let metric = match outcome {
                TestOutcome::Passed(metric) => metric,
                TestOutcome::Rejected(reason) => {
                    tracing::trace!(
                        bus = self.bus.name(),
                        actor = actor.name(),
                        reason,
                        "actor rejected action"
                    );
                    continue;
                }
            };
            match &winner {
                Some((_, best)) if !self.beats(&metric, best) => {}
                _ => winner = Some((Arc::clone(actor), metric)),
            }
            if self.policy == MediationPolicy::First {
                break;
            }
        }

        let Some((actor, metric)) = winner else {
            return Err(EngineError::NoActorFor {
                bus: self.bus.name(),
                kind: action.kind().to_owned(),
            });
        };
        tracing::debug!(
            bus = self.bus.name(),
            actor = actor.name(),
            kind = action.kind(),
            iterations = %metric.iterations,
            "mediated action"
        );
        actor.run(action, ctx, view).await
    }

    /// Whether `candidate` outranks the current `best` under the policy.
    /// Ties favor the earlier actor, so this is a strict comparison.
    fn beats(&self, candidate: &TestMetric, best: &TestMetric) -> bool {
        match self.policy {
            MediationPolicy::First => false,
            MediationPolicy::MinimumIterations => {
                candidate.iterations.cost_key() < best.iterations.cost_key()
            }
            MediationPolicy::MinimumTime => {
                candidate.time.unwrap_or(Duration::MAX) < best.time.unwrap_or(Duration::MAX)
            }
            MediationPolicy::MaximumPriority => candidate.priority > best.priority,
        }
    }
}
