use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use rdf_relay_api::{EngineView, QueryContext};
use rdf_relay_model::vocab::xsd;
use rdf_relay_model::{Bindings, Literal, Term, Variable};
use spargebra::algebra::{Expression, Function, GraphPattern};
use std::cmp::Ordering;
use std::sync::Arc;

/// Reduces SPARQL expressions over a solution to terms.
///
/// `None` is the distinguished *evaluation error* outcome of SPARQL
/// semantics: filters treat it as false, extends leave the target unbound,
/// order-by sorts it first. It is never a stream error.
///
/// Evaluation is async only because of `EXISTS`, which re-enters the
/// query-operation mediator; everything else completes synchronously.
pub struct ExpressionEvaluator {
    ctx: QueryContext,
    view: EngineView,
}

impl ExpressionEvaluator {
    pub fn new(ctx: QueryContext, view: EngineView) -> Arc<Self> {
        Arc::new(Self { ctx, view })
    }

    pub fn evaluate<'a>(
        &'a self,
        expression: &'a Expression,
        bindings: &'a Bindings,
    ) -> BoxFuture<'a, Option<Term>> {
        async move {
            match expression {
                Expression::NamedNode(n) => Some(n.clone().into()),
                Expression::Literal(l) => Some(l.clone().into()),
                Expression::Variable(v) => self.lookup(v, bindings).cloned(),
                Expression::Or(a, b) => {
                    let a = self.boolean(a, bindings).await;
                    let b = self.boolean(b, bindings).await;
                    match (a, b) {
                        (Some(true), _) | (_, Some(true)) => Some(bool_term(true)),
                        (Some(false), Some(false)) => Some(bool_term(false)),
                        _ => None,
                    }
                }
                Expression::And(a, b) => {
                    let a = self.boolean(a, bindings).await;
                    let b = self.boolean(b, bindings).await;
                    match (a, b) {
                        (Some(false), _) | (_, Some(false)) => Some(bool_term(false)),
                        (Some(true), Some(true)) => Some(bool_term(true)),
                        _ => None,
                    }
                }
                Expression::Equal(a, b) => {
                    let a = self.evaluate(a, bindings).await?;
                    let b = self.evaluate(b, bindings).await?;
                    equal_terms(&a, &b).map(bool_term)
                }
                Expression::SameTerm(a, b) => {
                    let a = self.evaluate(a, bindings).await?;
                    let b = self.evaluate(b, bindings).await?;
                    Some(bool_term(a == b))
                }
                Expression::Greater(a, b) => self.compare(a, b, bindings, Ordering::is_gt).await,
                Expression::GreaterOrEqual(a, b) => {
                    self.compare(a, b, bindings, Ordering::is_ge).await
                }
                Expression::Less(a, b) => self.compare(a, b, bindings, Ordering::is_lt).await,
                Expression::LessOrEqual(a, b) => {
                    self.compare(a, b, bindings, Ordering::is_le).await
                }
                Expression::In(needle, haystack) => {
                    let needle = self.evaluate(needle, bindings).await?;
                    let mut errored = false;
                    for candidate in haystack {
                        let candidate = self.evaluate(candidate, bindings).await;
                        match candidate.as_ref().and_then(|c| equal_terms(&needle, c)) {
                            Some(true) => return Some(bool_term(true)),
                            Some(false) => {}
                            None => errored = true,
                        }
                    }
                    (!errored).then(|| bool_term(false))
                }
                Expression::Add(a, b) => self.arithmetic(a, b, bindings, Numeric::add).await,
                Expression::Subtract(a, b) => {
                    self.arithmetic(a, b, bindings, Numeric::sub).await
                }
                Expression::Multiply(a, b) => {
                    self.arithmetic(a, b, bindings, Numeric::mul).await
                }
                Expression::Divide(a, b) => self.arithmetic(a, b, bindings, Numeric::div).await,
                Expression::UnaryPlus(a) => {
                    numeric(&self.evaluate(a, bindings).await?).map(Numeric::into_term)
                }
                Expression::UnaryMinus(a) => numeric(&self.evaluate(a, bindings).await?)
                    .map(|n| n.negate().into_term()),
                Expression::Not(a) => self.boolean(a, bindings).await.map(|b| bool_term(!b)),
                Expression::Exists(pattern) => {
                    self.exists(pattern, bindings).await.map(bool_term)
                }
                Expression::Bound(v) => Some(bool_term(self.lookup(v, bindings).is_some())),
                Expression::If(condition, then, otherwise) => {
                    match self.boolean(condition, bindings).await? {
                        true => self.evaluate(then, bindings).await,
                        false => self.evaluate(otherwise, bindings).await,
                    }
                }
                Expression::Coalesce(candidates) => {
                    for candidate in candidates {
                        if let Some(term) = self.evaluate(candidate, bindings).await {
                            return Some(term);
                        }
                    }
                    None
                }
                Expression::FunctionCall(function, args) => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.evaluate(arg, bindings).await?);
                    }
                    call_function(function, &values)
                }
            }
        }
        .boxed()
    }

    /// The effective boolean value of an expression.
    pub async fn boolean(
        &self,
        expression: &Expression,
        bindings: &Bindings,
    ) -> Option<bool> {
        effective_boolean_value(&self.evaluate(expression, bindings).await?)
    }

    fn lookup<'a>(&'a self, variable: &Variable, bindings: &'a Bindings) -> Option<&'a Term> {
        bindings
            .get(variable)
            .or_else(|| self.ctx.initial_bindings().get(variable))
    }

    async fn compare(
        &self,
        a: &Expression,
        b: &Expression,
        bindings: &Bindings,
        accept: impl Fn(Ordering) -> bool,
    ) -> Option<Term> {
        let a = self.evaluate(a, bindings).await?;
        let b = self.evaluate(b, bindings).await?;
        partial_compare(&a, &b).map(|ordering| bool_term(accept(ordering)))
    }

    async fn arithmetic(
        &self,
        a: &Expression,
        b: &Expression,
        bindings: &Bindings,
        op: impl Fn(Numeric, Numeric) -> Option<Numeric>,
    ) -> Option<Term> {
        let a = numeric(&self.evaluate(a, bindings).await?)?;
        let b = numeric(&self.evaluate(b, bindings).await?)?;
        op(a, b).map(Numeric::into_term)
    }

    /// `EXISTS { pattern }`: evaluate the pattern with the current solution
    /// merged into the initial bindings and probe for a first result.
    async fn exists(&self, pattern: &GraphPattern, bindings: &Bindings) -> Option<bool> {
        let seeded = self.ctx.initial_bindings().merge_with(bindings)?;
        let ctx = self.ctx.with_initial_bindings(seeded);
        let resolved = self
            .view
            .evaluate_operation(pattern.clone(), &ctx)
            .await
            .ok()?;
        let mut stream = resolved.stream;
        match stream.next().await {
            Some(Ok(_)) => Some(true),
            Some(Err(_)) => None,
            None => Some(false),
        }
    }
}

/// An owned evaluation future, for stream state machines that outlive the
/// operator's `run`.
pub(crate) fn boolean_future(
    evaluator: Arc<ExpressionEvaluator>,
    expression: Arc<Expression>,
    bindings: Bindings,
) -> BoxFuture<'static, (Bindings, Option<bool>)> {
    async move {
        let value = evaluator.boolean(&expression, &bindings).await;
        (bindings, value)
    }
    .boxed()
}

pub(crate) fn term_future(
    evaluator: Arc<ExpressionEvaluator>,
    expression: Arc<Expression>,
    bindings: Bindings,
) -> BoxFuture<'static, (Bindings, Option<Term>)> {
    async move {
        let value = evaluator.evaluate(&expression, &bindings).await;
        (bindings, value)
    }
    .boxed()
}

/// xsd:boolean coercion per SPARQL (EBV).
pub fn effective_boolean_value(term: &Term) -> Option<bool> {
    let Term::Literal(literal) = term else {
        return None;
    };
    let datatype = literal.datatype();
    if datatype == xsd::BOOLEAN {
        return match literal.value() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        };
    }
    if datatype == xsd::STRING || literal.language().is_some() {
        return Some(!literal.value().is_empty());
    }
    if let Some(n) = numeric(term) {
        return Some(match n {
            Numeric::Integer(i) => i != 0,
            Numeric::Double(d) => d != 0.0 && !d.is_nan(),
        });
    }
    None
}

/// `=` with numeric coercion; `None` when the comparison is an error (e.g.
/// literals of unknown datatypes that are not identical).
pub fn equal_terms(a: &Term, b: &Term) -> Option<bool> {
    if a == b {
        return Some(true);
    }
    if let (Some(a), Some(b)) = (numeric(a), numeric(b)) {
        return Some(a.as_double() == b.as_double());
    }
    match (a, b) {
        (Term::Literal(a), Term::Literal(b)) => {
            if a.datatype() == b.datatype() {
                Some(false)
            } else {
                // Different datatypes we know nothing about: error.
                None
            }
        }
        _ => Some(false),
    }
}

/// `<`-family comparison; `None` is an evaluation error.
pub fn partial_compare(a: &Term, b: &Term) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (numeric(a), numeric(b)) {
        return a.as_double().partial_cmp(&b.as_double());
    }
    match (a, b) {
        (Term::Literal(a), Term::Literal(b)) => {
            let comparable_strings = |l: &Literal| {
                l.datatype() == xsd::STRING || l.language().is_some()
            };
            if comparable_strings(a) && comparable_strings(b) {
                Some(a.value().cmp(b.value()))
            } else if a.datatype() == xsd::BOOLEAN && b.datatype() == xsd::BOOLEAN {
                Some(a.value().cmp(b.value()))
            } else if a.datatype() == b.datatype() {
                // Same unknown datatype: compare lexical forms, which at
                // least is total and stable.
                Some(a.value().cmp(b.value()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// The total order over optional terms used by ORDER BY: unbound, then blank
/// nodes, then IRIs, then literals.
pub fn order_terms(a: Option<&Term>, b: Option<&Term>) -> Ordering {
    fn rank(term: &Term) -> u8 {
        match term {
            Term::BlankNode(_) => 1,
            Term::NamedNode(_) => 2,
            Term::Literal(_) => 3,
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => rank(a).cmp(&rank(b)).then_with(|| {
            partial_compare(a, b).unwrap_or_else(|| a.to_string().cmp(&b.to_string()))
        }),
    }
}

/// The SPARQL numeric tower, collapsed to integer and double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Double(f64),
}

impl Numeric {
    pub fn as_double(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Double(d) => d,
        }
    }

    pub(crate) fn negate(self) -> Numeric {
        match self {
            Numeric::Integer(i) => Numeric::Integer(-i),
            Numeric::Double(d) => Numeric::Double(-d),
        }
    }

    pub(crate) fn add(self, other: Numeric) -> Option<Numeric> {
        self.binary(other, i64::checked_add, |a, b| a + b)
    }

    fn sub(self, other: Numeric) -> Option<Numeric> {
        self.binary(other, i64::checked_sub, |a, b| a - b)
    }

    fn mul(self, other: Numeric) -> Option<Numeric> {
        self.binary(other, i64::checked_mul, |a, b| a * b)
    }

    fn div(self, other: Numeric) -> Option<Numeric> {
        // SPARQL integer division produces a decimal; double covers it.
        if other.as_double() == 0.0 {
            return None;
        }
        Some(Numeric::Double(self.as_double() / other.as_double()))
    }

    fn binary(
        self,
        other: Numeric,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        double_op: impl Fn(f64, f64) -> f64,
    ) -> Option<Numeric> {
        match (self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => {
                int_op(a, b).map(Numeric::Integer)
            }
            (a, b) => Some(Numeric::Double(double_op(a.as_double(), b.as_double()))),
        }
    }

    pub(crate) fn into_term(self) -> Term {
        match self {
            Numeric::Integer(i) => Literal::from(i).into(),
            Numeric::Double(d) => Literal::from(d).into(),
        }
    }
}

/// Reads a term as a numeric value, accepting the xsd numeric datatypes.
pub fn numeric(term: &Term) -> Option<Numeric> {
    let Term::Literal(literal) = term else {
        return None;
    };
    let datatype = literal.datatype();
    if datatype == xsd::INTEGER {
        return literal.value().parse().ok().map(Numeric::Integer);
    }
    if datatype == xsd::DECIMAL || datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
        return literal.value().parse().ok().map(Numeric::Double);
    }
    None
}

fn call_function(function: &Function, args: &[Term]) -> Option<Term> {
    let string_arg = |i: usize| -> Option<&Literal> {
        match args.get(i)? {
            Term::Literal(l) if l.datatype() == xsd::STRING || l.language().is_some() => {
                Some(l)
            }
            _ => None,
        }
    };
    match function {
        Function::Str => Some(Literal::new_simple_literal(str_value(args.first()?)).into()),
        Function::Lang => match args.first()? {
            Term::Literal(l) => {
                Some(Literal::new_simple_literal(l.language().unwrap_or("")).into())
            }
            _ => None,
        },
        Function::Datatype => match args.first()? {
            Term::Literal(l) => Some(l.datatype().into_owned().into()),
            _ => None,
        },
        Function::IsIri => Some(bool_term(matches!(args.first()?, Term::NamedNode(_)))),
        Function::IsBlank => Some(bool_term(matches!(args.first()?, Term::BlankNode(_)))),
        Function::IsLiteral => Some(bool_term(matches!(args.first()?, Term::Literal(_)))),
        Function::IsNumeric => Some(bool_term(numeric(args.first()?).is_some())),
        Function::StrLen => {
            Some(Literal::from(string_arg(0)?.value().chars().count() as i64).into())
        }
        Function::UCase => {
            Some(with_string_flavor(string_arg(0)?, |s| s.to_uppercase()).into())
        }
        Function::LCase => {
            Some(with_string_flavor(string_arg(0)?, |s| s.to_lowercase()).into())
        }
        Function::Contains => {
            Some(bool_term(string_arg(0)?.value().contains(string_arg(1)?.value())))
        }
        Function::StrStarts => {
            Some(bool_term(string_arg(0)?.value().starts_with(string_arg(1)?.value())))
        }
        Function::StrEnds => {
            Some(bool_term(string_arg(0)?.value().ends_with(string_arg(1)?.value())))
        }
        Function::Concat => {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Term::Literal(l) => out.push_str(l.value()),
                    _ => return None,
                }
            }
            Some(Literal::new_simple_literal(out).into())
        }
        Function::Abs => numeric(args.first()?).map(|n| match n {
            Numeric::Integer(i) => Literal::from(i.abs()).into(),
            Numeric::Double(d) => Literal::from(d.abs()).into(),
        }),
        Function::Ceil => rounded(args.first()?, f64::ceil),
        Function::Floor => rounded(args.first()?, f64::floor),
        Function::Round => rounded(args.first()?, f64::round),
        // Anything else is an evaluation error, per SPARQL.
        _ => None,
    }
}

fn rounded(term: &Term, op: impl Fn(f64) -> f64) -> Option<Term> {
    numeric(term).map(|n| match n {
        Numeric::Integer(i) => Literal::from(i).into(),
        Numeric::Double(d) => Literal::from(op(d)).into(),
    })
}

fn with_string_flavor(literal: &Literal, op: impl Fn(&str) -> String) -> Literal {
    match literal.language() {
        Some(language) => {
            Literal::new_language_tagged_literal_unchecked(op(literal.value()), language)
        }
        None => Literal::new_simple_literal(op(literal.value())),
    }
}

fn bool_term(value: bool) -> Term {
    Literal::from(value).into()
}

fn str_value(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_owned(),
        Term::BlankNode(b) => b.as_str().to_owned(),
        Term::Literal(l) => l.value().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Term {
        Literal::from(value).into()
    }

    #[test]
    fn numeric_comparison_promotes_integers() {
        assert_eq!(
            partial_compare(&int(2), &Literal::from(2.5).into()),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn ebv_of_a_plain_string_is_non_emptiness() {
        assert_eq!(
            effective_boolean_value(&Literal::new_simple_literal("x").into()),
            Some(true)
        );
        assert_eq!(
            effective_boolean_value(&Literal::new_simple_literal("").into()),
            Some(false)
        );
    }

    #[test]
    fn iri_comparison_is_an_error() {
        let a = rdf_relay_model::NamedNode::new_unchecked("http://example.com/a").into();
        let b = rdf_relay_model::NamedNode::new_unchecked("http://example.com/b").into();
        assert_eq!(partial_compare(&a, &b), None);
        assert_eq!(equal_terms(&a, &b), Some(false));
    }

    #[test]
    fn unbound_sorts_first_in_the_order_by_order() {
        let term = int(1);
        assert_eq!(order_terms(None, Some(&term)), Ordering::Less);
    }
}
