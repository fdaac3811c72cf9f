use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rdf_relay_model::vocab::{hydra, rdf, void};
use rdf_relay_model::{NamedNodePattern, Quad, QuadPattern, Subject, Term, TermPattern};

/// Everything allowed verbatim inside a URI template value.
const VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The position of the quad a search-form variable maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedPosition {
    Subject,
    Predicate,
    Object,
}

/// A Hydra search form: a URI template plus the variable-to-position
/// mappings needed to instantiate it for a pattern.
#[derive(Debug, Clone)]
pub struct SearchForm {
    pub template: String,
    pub mappings: Vec<(String, MappedPosition)>,
}

/// The hypermedia controls a page advertises.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    pub search: Option<SearchForm>,
    pub next: Option<String>,
    /// `void:triples` / `hydra:totalItems` of the fragment, when stated.
    pub total_items: Option<u64>,
}

/// Extracts Hydra / VoID controls from a page's metadata quads.
pub fn extract_controls(metadata: &[Quad], page_url: &str) -> Controls {
    let mut controls = Controls::default();

    // hydra:next of this page.
    controls.next = metadata
        .iter()
        .filter(|quad| quad.predicate == hydra::NEXT && subject_is(quad, page_url))
        .find_map(|quad| match &quad.object {
            Term::NamedNode(next) => Some(next.as_str().to_owned()),
            _ => None,
        });

    // Prefer a count stated about this very page, fall back to any.
    let counts = |scoped: bool| {
        metadata
            .iter()
            .filter(|quad| {
                (quad.predicate == void::TRIPLES || quad.predicate == hydra::TOTAL_ITEMS)
                    && (!scoped || subject_is(quad, page_url))
            })
            .find_map(|quad| match &quad.object {
                Term::Literal(count) => count.value().parse::<u64>().ok(),
                _ => None,
            })
    };
    controls.total_items = counts(true).or_else(|| counts(false));

    // hydra:search -> form; form hydra:template; form hydra:mapping m*,
    // each m carrying hydra:variable and hydra:property.
    if let Some(form) = metadata
        .iter()
        .filter(|quad| quad.predicate == hydra::SEARCH)
        .map(|quad| &quad.object)
        .next()
    {
        let template = object_of(metadata, form, hydra::TEMPLATE).and_then(|term| {
            match term {
                Term::Literal(template) => Some(template.value().to_owned()),
                _ => None,
            }
        });
        if let Some(template) = template {
            let mut mappings = Vec::new();
            for mapping in metadata
                .iter()
                .filter(|quad| {
                    quad.predicate == hydra::MAPPING && Term::from(quad.subject.clone()) == *form
                })
                .map(|quad| &quad.object)
            {
                let variable = object_of(metadata, mapping, hydra::VARIABLE);
                let property = object_of(metadata, mapping, hydra::PROPERTY);
                let position = match property {
                    Some(Term::NamedNode(p)) if p == rdf::SUBJECT => MappedPosition::Subject,
                    Some(Term::NamedNode(p)) if p == rdf::PREDICATE => {
                        MappedPosition::Predicate
                    }
                    Some(Term::NamedNode(p)) if p == rdf::OBJECT => MappedPosition::Object,
                    _ => continue,
                };
                if let Some(Term::Literal(variable)) = variable {
                    mappings.push((variable.value().to_owned(), position));
                }
            }
            controls.search = Some(SearchForm { template, mappings });
        }
    }

    controls
}

/// Instantiates a search form with the pattern's ground terms.
///
/// Supports the level-1/level-3 URI-template subset TPF servers use:
/// a single `{?a,b,c}` query expansion, plus literal text around it.
pub fn instantiate_search_form(form: &SearchForm, pattern: &QuadPattern) -> String {
    let value_for = |position: MappedPosition| -> Option<String> {
        match position {
            MappedPosition::Subject => term_pattern_value(&pattern.subject),
            MappedPosition::Predicate => match &pattern.predicate {
                NamedNodePattern::NamedNode(p) => Some(p.as_str().to_owned()),
                NamedNodePattern::Variable(_) => None,
            },
            MappedPosition::Object => term_pattern_value(&pattern.object),
        }
    };

    let template = &form.template;
    let Some(open) = template.find("{?") else {
        return template.clone();
    };
    let Some(close) = template[open..].find('}') else {
        return template.clone();
    };
    let names: Vec<&str> = template[open + 2..open + close].split(',').collect();

    let mut parameters = Vec::new();
    for (variable, position) in &form.mappings {
        if !names.contains(&variable.as_str()) {
            continue;
        }
        if let Some(value) = value_for(*position) {
            parameters.push(format!(
                "{variable}={}",
                utf8_percent_encode(&value, VALUE_SET)
            ));
        }
    }

    let mut url = template[..open].to_owned();
    if !parameters.is_empty() {
        url.push('?');
        url.push_str(&parameters.join("&"));
    }
    url.push_str(&template[open + close + 1..]);
    url
}

/// The TPF wire form of a ground pattern position: IRIs bare, literals in
/// their N-Triples syntax.
fn term_pattern_value(pattern: &TermPattern) -> Option<String> {
    match pattern {
        TermPattern::NamedNode(n) => Some(n.as_str().to_owned()),
        TermPattern::Literal(l) => Some(l.to_string()),
        TermPattern::BlankNode(_) | TermPattern::Variable(_) => None,
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn subject_is(quad: &Quad, url: &str) -> bool {
    match &quad.subject {
        Subject::NamedNode(subject) => subject.as_str() == url,
        _ => false,
    }
}

fn object_of(
    metadata: &[Quad],
    subject: &Term,
    predicate: rdf_relay_model::NamedNodeRef<'_>,
) -> Option<Term> {
    metadata
        .iter()
        .find(|quad| {
            Term::from(quad.subject.clone()) == *subject && quad.predicate.as_ref() == predicate
        })
        .map(|quad| quad.object.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_relay_model::{BlankNode, GraphName, Literal, NamedNode, Variable};
    use rdf_relay_model::GraphNamePattern;

    fn iri(value: &str) -> NamedNode {
        NamedNode::new_unchecked(value)
    }

    fn tpf_metadata(page: &str) -> Vec<Quad> {
        let form = BlankNode::new_unchecked("form");
        let (ms, mp, mo) = (
            BlankNode::new_unchecked("ms"),
            BlankNode::new_unchecked("mp"),
            BlankNode::new_unchecked("mo"),
        );
        let mut quads = vec![
            Quad::new(
                iri(page),
                hydra::SEARCH.into_owned(),
                form.clone(),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                form.clone(),
                hydra::TEMPLATE.into_owned(),
                Literal::new_simple_literal("http://example.com/data{?s,p,o}"),
                GraphName::DefaultGraph,
            ),
            Quad::new(
                iri(page),
                void::TRIPLES.into_owned(),
                Literal::from(42),
                GraphName::DefaultGraph,
            ),
        ];
        for (node, name, position) in [
            (ms, "s", rdf::SUBJECT),
            (mp, "p", rdf::PREDICATE),
            (mo, "o", rdf::OBJECT),
        ] {
            quads.push(Quad::new(
                form.clone(),
                hydra::MAPPING.into_owned(),
                node.clone(),
                GraphName::DefaultGraph,
            ));
            quads.push(Quad::new(
                node.clone(),
                hydra::VARIABLE.into_owned(),
                Literal::new_simple_literal(name),
                GraphName::DefaultGraph,
            ));
            quads.push(Quad::new(
                node,
                hydra::PROPERTY.into_owned(),
                position.into_owned(),
                GraphName::DefaultGraph,
            ));
        }
        quads
    }

    #[test]
    fn extracts_the_search_form_and_count() {
        let controls = extract_controls(&tpf_metadata("http://example.com/data"), "http://example.com/data");
        assert_eq!(controls.total_items, Some(42));
        let form = controls.search.expect("form advertised");
        assert_eq!(form.mappings.len(), 3);
    }

    #[test]
    fn instantiates_only_the_ground_positions() {
        let controls = extract_controls(&tpf_metadata("http://example.com/data"), "http://example.com/data");
        let form = controls.search.expect("form advertised");
        let pattern = QuadPattern::new(
            Variable::new_unchecked("s"),
            iri("http://example.com/knows"),
            Variable::new_unchecked("o"),
            GraphNamePattern::DefaultGraph,
        );
        let url = instantiate_search_form(&form, &pattern);
        assert_eq!(
            url,
            "http://example.com/data?p=http%3A%2F%2Fexample.com%2Fknows"
        );
    }
}
