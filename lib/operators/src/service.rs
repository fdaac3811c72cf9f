use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, FetchRequest, OperationAction, QueryContext,
    ResolvedBindings, TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, NamedNode, Term, Variable};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use spargebra::algebra::GraphPattern;
use spargebra::term::NamedNodePattern;
use spargebra::Query;
use std::sync::Arc;

const SPARQL_QUERY: &str = "application/sparql-query";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// `SERVICE`: serializes the inner pattern back to a SELECT query and
/// evaluates it against the remote endpoint through the fetch contract.
/// With `SILENT`, any failure collapses to the empty result.
pub struct ServiceOperator;

#[async_trait]
impl Actor<OperationAction> for ServiceOperator {
    fn name(&self) -> &'static str {
        "operator-service"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "service" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a service node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Service {
            name,
            inner,
            silent,
        } = action.operation
        else {
            return EngineError::internal("service operator dispatched on a foreign node");
        };
        let endpoint = match resolve_endpoint(&name, ctx) {
            Ok(endpoint) => endpoint,
            Err(e) if silent => return Ok(silenced(e)),
            Err(e) => return Err(e),
        };
        match evaluate_remote(&endpoint, *inner, ctx, view).await {
            Ok(result) => Ok(result),
            Err(e) if silent => Ok(silenced(e)),
            Err(e) => Err(e),
        }
    }
}

fn resolve_endpoint(
    name: &NamedNodePattern,
    ctx: &QueryContext,
) -> EngineResult<NamedNode> {
    match name {
        NamedNodePattern::NamedNode(endpoint) => Ok(endpoint.clone()),
        NamedNodePattern::Variable(variable) => {
            match ctx.initial_bindings().get(variable) {
                Some(Term::NamedNode(endpoint)) => Ok(endpoint.clone()),
                Some(term) => Err(EngineError::InvalidServiceName(term.clone())),
                None => Err(EngineError::UnboundService),
            }
        }
    }
}

async fn evaluate_remote(
    endpoint: &NamedNode,
    pattern: GraphPattern,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    let query = Query::Select {
        dataset: None,
        pattern,
        base_iri: None,
    }
    .to_string();
    tracing::debug!(endpoint = endpoint.as_str(), query = %query, "delegating to service");

    let request = FetchRequest::post(endpoint.as_str(), query.into_bytes(), SPARQL_QUERY)
        .with_accept(SPARQL_RESULTS_JSON)
        .with_auth(ctx.auth().map(str::to_owned), ctx.include_credentials());
    let response = view.fetcher.fetch(request).await?;
    if !response.ok {
        return Err(EngineError::source(
            endpoint.as_str(),
            format!("HTTP status {}", response.status),
        ));
    }

    let parser = QueryResultsParser::from_format(QueryResultsFormat::Json);
    match parser.for_reader(response.body.as_slice())? {
        ReaderQueryResultsParserOutput::Boolean(_) => Err(EngineError::UnsupportedOperation(
            "service returned a boolean instead of solutions".to_owned(),
        )),
        ReaderQueryResultsParserOutput::Solutions(solutions) => {
            let variables: Arc<[Variable]> = solutions.variables().to_vec().into();
            let mut out = Vec::new();
            for solution in solutions {
                let solution = solution?;
                out.push(
                    solution
                        .iter()
                        .map(|(variable, term)| (variable.clone(), term.clone()))
                        .collect::<Bindings>(),
                );
            }
            Ok(ResolvedBindings::from_solutions(variables, out))
        }
    }
}

fn silenced(error: EngineError) -> ResolvedBindings {
    tracing::debug!(error = %error, "SERVICE SILENT swallowed a failure");
    ResolvedBindings::empty([].into())
}
