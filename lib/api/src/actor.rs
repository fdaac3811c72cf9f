use crate::{EngineView, QueryContext};
use async_trait::async_trait;
use rdf_relay_common::{Cardinality, EngineResult};
use std::time::Duration;

/// An action carried by a bus, together with the output type its handlers
/// produce. One implementing type exists per bus.
pub trait BusAction: Send {
    type Output: Send;

    /// A short tag describing the action, used in dispatch-failure messages
    /// and log lines.
    fn kind(&self) -> &'static str;
}

/// The self-reported suitability of an actor for an action.
#[derive(Debug, Clone, PartialEq)]
pub struct TestMetric {
    /// How many items the actor expects to iterate while running the action.
    pub iterations: Cardinality,
    /// How long the actor expects the action to take, when it can tell.
    pub time: Option<Duration>,
    /// A tie-breaking weight for number-based mediation; larger wins.
    pub priority: f64,
}

impl Default for TestMetric {
    fn default() -> Self {
        Self {
            iterations: Cardinality::Exact(0),
            time: None,
            priority: 0.0,
        }
    }
}

impl TestMetric {
    pub fn iterations(iterations: Cardinality) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }
}

/// The reply of an actor's `test`: either a metric under which the mediator
/// ranks it, or the reason it cannot handle the action.
///
/// Rejection is an ordinary value, not an error; a bus where every actor
/// rejects becomes [`rdf_relay_common::EngineError::NoActorFor`] at the
/// mediator.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Passed(TestMetric),
    Rejected(&'static str),
}

impl TestOutcome {
    /// Passes with the default metric. Used by actors that are the sole
    /// handler for their action tag.
    pub fn passed() -> Self {
        Self::Passed(TestMetric::default())
    }

    pub fn metric(&self) -> Option<&TestMetric> {
        match self {
            Self::Passed(metric) => Some(metric),
            Self::Rejected(_) => None,
        }
    }
}

/// A handler published on a bus.
///
/// `test` must be pure: it reports suitability without side effects and may
/// be called repeatedly or not at all. Only the winning `run` may open
/// resources or observe the world.
#[async_trait]
pub trait Actor<A: BusAction>: Send + Sync {
    fn name(&self) -> &'static str;

    fn test(&self, action: &A, ctx: &QueryContext) -> TestOutcome;

    async fn run(
        &self,
        action: A,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<A::Output>;
}
