#![allow(clippy::print_stdout, clippy::print_stderr)]
use crate::cli::{Args, Command, OutputFormat};
use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt;
use rdf_relay::api::{QueryContext, Source};
use rdf_relay::common::EngineError;
use rdf_relay::engine::{QueryEngine, QueryResults};
use sparesults::QueryResultsFormat;
use std::io::{stdout, Read, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rdf-relay: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// 1 for parse/evaluation errors, 3 for unreachable sources.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<EngineError>() {
        Some(EngineError::Source { .. }) => 3,
        _ => 1,
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let Command::Query {
        query,
        query_file,
        sources,
        format,
        auth,
        lenient,
        timeout,
    } = args.command;

    let query = match (query, query_file) {
        (Some(query), _) => query,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read query file {}", path.display()))?,
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read query from stdin")?;
            buffer
        }
    };

    let mut ctx = QueryContext::new()
        .with_sources(sources.iter().map(|s| parse_source(s)).collect())
        .with_lenient(lenient);
    if let Some(auth) = auth {
        ctx = ctx.with_auth(auth);
    }
    if let Some(timeout) = timeout {
        ctx = ctx.with_deadline(Instant::now() + Duration::from_secs(timeout));
    }

    let engine = QueryEngine::default();
    let results = engine.query(&query, &ctx).await?;
    write_results(results, format).await
}

fn parse_source(descriptor: &str) -> Source {
    if let Some(url) = descriptor.strip_prefix("sparql@") {
        Source::sparql(url)
    } else if let Some(url) = descriptor.strip_prefix("hypermedia@") {
        Source::hypermedia(url)
    } else if let Some(path) = descriptor.strip_prefix("file@") {
        Source::file(path)
    } else if !descriptor.contains("://") {
        Source::file(descriptor)
    } else {
        Source::iri(descriptor)
    }
}

async fn write_results(results: QueryResults, format: OutputFormat) -> anyhow::Result<()> {
    let results_format = match format {
        OutputFormat::Json => QueryResultsFormat::Json,
        OutputFormat::Xml => QueryResultsFormat::Xml,
        OutputFormat::Csv => QueryResultsFormat::Csv,
        OutputFormat::Tsv => QueryResultsFormat::Tsv,
        OutputFormat::Table => return write_table(results).await,
    };
    let mut writer = results.write(stdout().lock(), results_format).await?;
    writer.flush()?;
    Ok(())
}

/// Renders solutions as an aligned text table.
async fn write_table(results: QueryResults) -> anyhow::Result<()> {
    match results {
        QueryResults::Boolean(value) => {
            println!("{value}");
            Ok(())
        }
        QueryResults::Graph(mut triples) => {
            let out = stdout();
            let mut out = out.lock();
            while let Some(triple) = triples.next().await {
                writeln!(out, "{} .", triple?)?;
            }
            Ok(())
        }
        QueryResults::Solutions(mut stream) => {
            let variables = stream.variables().to_vec();
            let mut rows = Vec::new();
            while let Some(solution) = stream.next().await {
                let solution = solution?;
                rows.push(
                    variables
                        .iter()
                        .map(|v| solution.get(v).map(ToString::to_string).unwrap_or_default())
                        .collect::<Vec<_>>(),
                );
            }

            let mut widths: Vec<usize> =
                variables.iter().map(|v| v.as_str().len()).collect();
            for row in &rows {
                for (width, cell) in widths.iter_mut().zip(row) {
                    *width = (*width).max(cell.len());
                }
            }

            let out = stdout();
            let mut out = out.lock();
            let header: Vec<String> = variables
                .iter()
                .zip(&widths)
                .map(|(v, width)| format!("{:<width$}", v.as_str()))
                .collect();
            writeln!(out, "{}", header.join("  "))?;
            writeln!(
                out,
                "{}",
                widths
                    .iter()
                    .map(|width| "-".repeat(*width))
                    .collect::<Vec<_>>()
                    .join("  ")
            )?;
            for row in rows {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{cell:<width$}"))
                    .collect();
                writeln!(out, "{}", line.join("  ").trim_end())?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic_in_result_fn)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_cmd::Command;
    use assert_fs::prelude::*;
    use assert_fs::NamedTempFile;
    use predicates::prelude::*;
    use rdf_relay::api::SourceKind;

    fn cli_command() -> Command {
        let mut command = Command::new(env!("CARGO"));
        command.arg("run").arg("--bin").arg("rdf-relay");
        command.arg("--");
        command
    }

    fn data_file() -> Result<NamedTempFile> {
        let file = NamedTempFile::new("data.ttl")?;
        file.write_str(
            "<http://ex/a> <http://ex/p> <http://ex/b> .\n\
             <http://ex/b> <http://ex/p> <http://ex/c> .\n",
        )?;
        Ok(file)
    }

    #[test]
    fn source_prefixes_select_the_family() {
        for (descriptor, expected) in [
            ("sparql@http://example.com/sparql", SourceKind::Sparql),
            ("hypermedia@http://example.com/data", SourceKind::Hypermedia),
            ("file@/tmp/data.ttl", SourceKind::File),
            ("data/local.nt", SourceKind::File),
            ("http://example.com/doc.ttl", SourceKind::Auto),
        ] {
            let Source::Iri { kind, .. } = parse_source(descriptor) else {
                panic!("expected an IRI source for {descriptor}");
            };
            assert_eq!(kind, expected, "{descriptor}");
        }
    }

    #[test]
    fn cli_help() {
        // Missing arguments are clap's concern: exit code 2.
        cli_command()
            .assert()
            .failure()
            .code(2)
            .stdout("")
            .stderr(predicate::str::contains("rdf-relay"));
    }

    #[test]
    fn cli_query_over_a_file_source() -> Result<()> {
        let data = data_file()?;
        cli_command()
            .arg("query")
            .arg("--query")
            .arg("SELECT ?s WHERE { ?s <http://ex/p> <http://ex/b> }")
            .arg("--source")
            .arg(data.path())
            .arg("--format")
            .arg("csv")
            .assert()
            .success()
            .stdout(predicate::str::contains("http://ex/a"));
        Ok(())
    }

    #[test]
    fn cli_reads_the_query_from_a_file() -> Result<()> {
        let data = data_file()?;
        let query = NamedTempFile::new("query.rq")?;
        query.write_str("SELECT ?s ?o WHERE { ?s <http://ex/p> ?o }")?;
        cli_command()
            .arg("query")
            .arg("--query-file")
            .arg(query.path())
            .arg("--source")
            .arg(data.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("<http://ex/b>"));
        Ok(())
    }

    #[test]
    fn cli_reports_a_parse_error_with_exit_code_1() -> Result<()> {
        let data = data_file()?;
        cli_command()
            .arg("query")
            .arg("--query")
            .arg("SELECT WHERE {")
            .arg("--source")
            .arg(data.path())
            .assert()
            .failure()
            .code(1);
        Ok(())
    }

    #[test]
    fn cli_reports_an_unreachable_source_with_exit_code_3() {
        cli_command()
            .arg("query")
            .arg("--query")
            .arg("SELECT * WHERE { ?s ?p ?o }")
            .arg("--source")
            .arg("file@/nonexistent/rdf-relay-test.ttl")
            .assert()
            .failure()
            .code(3);
    }

    #[test]
    fn clap_debug() {
        use clap::CommandFactory;

        Args::command().debug_assert()
    }
}
