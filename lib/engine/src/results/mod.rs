mod solutions;
mod triples;

pub use solutions::QuerySolutionStream;
pub use triples::QueryTripleStream;

use futures::StreamExt;
use oxrdfio::{RdfFormat, RdfSerializer};
use rdf_relay_common::EngineResult;
pub use sparesults::QueryResultsFormat;
use sparesults::QueryResultsSerializer;
use std::io::Write;

/// The results of a query evaluation, shaped by the query form.
pub enum QueryResults {
    /// `SELECT`: a lazy stream of solutions.
    Solutions(QuerySolutionStream),
    /// `ASK`.
    Boolean(bool),
    /// `CONSTRUCT` / `DESCRIBE`: a lazy stream of triples.
    Graph(QueryTripleStream),
}

impl QueryResults {
    /// Serializes solutions or a boolean in a SPARQL results syntax,
    /// draining the stream. Graph results go through
    /// [`QueryResults::write_graph`].
    pub async fn write<W: Write>(
        self,
        writer: W,
        format: QueryResultsFormat,
    ) -> EngineResult<W> {
        let serializer = QueryResultsSerializer::from_format(format);
        match self {
            QueryResults::Boolean(value) => {
                Ok(serializer.serialize_boolean_to_writer(writer, value)?)
            }
            QueryResults::Solutions(mut solutions) => {
                let mut writer = serializer.serialize_solutions_to_writer(
                    writer,
                    solutions.variables().to_vec(),
                )?;
                while let Some(solution) = solutions.next().await {
                    writer.serialize(&solution?)?;
                }
                Ok(writer.finish()?)
            }
            QueryResults::Graph(mut triples) => {
                // Graphs have no SPARQL-results form; emit N-Triples.
                let mut serializer =
                    RdfSerializer::from_format(RdfFormat::NTriples).for_writer(writer);
                while let Some(triple) = triples.next().await {
                    serializer.serialize_triple(&triple?)?;
                }
                Ok(serializer.finish()?)
            }
        }
    }

    /// Serializes a graph result in the given RDF syntax, draining the
    /// stream.
    pub async fn write_graph<W: Write>(self, writer: W, format: RdfFormat) -> EngineResult<W> {
        match self {
            QueryResults::Graph(mut triples) => {
                let mut serializer = RdfSerializer::from_format(format).for_writer(writer);
                while let Some(triple) = triples.next().await {
                    serializer.serialize_triple(&triple?)?;
                }
                Ok(serializer.finish()?)
            }
            _ => rdf_relay_common::EngineError::internal(
                "write_graph on a non-graph result",
            ),
        }
    }
}
