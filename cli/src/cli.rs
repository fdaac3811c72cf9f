use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rdf-relay",
    version,
    about = "rdf-relay: query heterogeneous RDF sources with SPARQL"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate a SPARQL query against one or more sources.
    Query {
        /// The SPARQL query string. Reads stdin when neither this nor
        /// --query-file is given.
        #[arg(short, long)]
        query: Option<String>,
        /// A file to read the SPARQL query from.
        #[arg(long, conflicts_with = "query")]
        query_file: Option<PathBuf>,
        /// A source to query. Prefix with `sparql@`, `hypermedia@` or
        /// `file@` to pin the source family; plain URLs are detected from
        /// their hypermedia controls.
        #[arg(short, long = "source", required = true)]
        sources: Vec<String>,
        /// The result format.
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
        /// `user:password` credentials sent to the sources.
        #[arg(long)]
        auth: Option<String>,
        /// Tolerate malformed quads in source documents.
        #[arg(long)]
        lenient: bool,
        /// Abort evaluation after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// SPARQL results JSON.
    Json,
    /// SPARQL results XML.
    Xml,
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// A human-readable table.
    Table,
}
