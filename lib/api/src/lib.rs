mod actions;
mod actor;
mod bus;
mod context;
mod dereference;
mod fetch;
mod mediator;
mod source;
mod view;

pub use actions::{
    operation_kind, JoinAction, OperationAction, QuadPatternAction, ResolvedBindings,
    ResolvedQuads,
};
pub use actor::{Actor, BusAction, TestMetric, TestOutcome};
pub use bus::Bus;
pub use context::QueryContext;
pub use dereference::{Dereference, Dereferencer};
pub use fetch::{FetchRequest, FetchResponse, Fetcher};
pub use mediator::{MediationPolicy, Mediator};
pub use source::{MemoryQuadSource, Source, SourceKind};
pub use view::EngineView;
