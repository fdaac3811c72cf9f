mod bindings_stream;
mod deadline;
mod slice;

pub use bindings_stream::{
    empty, from_solutions, once, BindingsStream, BindingsStreamAdapter,
    SendableBindingsStream,
};
pub use deadline::DeadlineStream;
pub use slice::SliceStream;

use futures::stream::BoxStream;
use rdf_relay_common::EngineResult;
use rdf_relay_model::Quad;

/// A lazy, single-consumption stream of quads.
///
/// Quad streams carry no variables list, so a plain boxed stream suffices.
/// Cancellation is dropping the stream.
pub type SendableQuadStream = BoxStream<'static, EngineResult<Quad>>;
