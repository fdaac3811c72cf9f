use oxrdf::{Term, Variable};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An immutable solution mapping from variables to RDF terms.
///
/// Every mutation produces a new value; the map itself is shared behind an
/// [`Arc`], so cloning a `Bindings` is cheap and widely done across join
/// tables, dedup sets, and emitted solutions.
///
/// Two bindings are *compatible* iff every variable present in both maps to
/// equal terms; the merge of two compatible bindings is their union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bindings {
    inner: Arc<BTreeMap<Variable, Term>>,
}

impl Bindings {
    /// The empty solution mapping (the join identity).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the term bound to `variable`, if any.
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.inner.get(variable)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.inner.contains_key(variable)
    }

    /// Returns a new mapping with `variable` bound to `term`.
    ///
    /// An existing binding for the same variable is replaced; callers that
    /// need merge semantics go through [`Bindings::merge_with`].
    pub fn bind(&self, variable: Variable, term: Term) -> Self {
        let mut inner = BTreeMap::clone(&self.inner);
        inner.insert(variable, term);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns whether `self` and `other` agree on all shared variables.
    pub fn is_compatible_with(&self, other: &Bindings) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .all(|(variable, term)| match large.get(variable) {
                Some(bound) => bound == term,
                None => true,
            })
    }

    /// Merges two compatible bindings into their union; `None` on conflict.
    pub fn merge_with(&self, other: &Bindings) -> Option<Bindings> {
        if !self.is_compatible_with(other) {
            return None;
        }
        if other.is_empty() {
            return Some(self.clone());
        }
        if self.is_empty() {
            return Some(other.clone());
        }
        let mut inner = BTreeMap::clone(&self.inner);
        for (variable, term) in other.iter() {
            inner.insert(variable.clone(), term.clone());
        }
        Some(Bindings {
            inner: Arc::new(inner),
        })
    }

    /// Restricts the mapping to the given variables.
    pub fn project(&self, variables: &[Variable]) -> Bindings {
        let inner = self
            .inner
            .iter()
            .filter(|(variable, _)| variables.contains(variable))
            .map(|(variable, term)| (variable.clone(), term.clone()))
            .collect();
        Bindings {
            inner: Arc::new(inner),
        }
    }

    /// Returns a new mapping without the given variable.
    pub fn without(&self, variable: &Variable) -> Bindings {
        if !self.contains(variable) {
            return self.clone();
        }
        let mut inner = BTreeMap::clone(&self.inner);
        inner.remove(variable);
        Bindings {
            inner: Arc::new(inner),
        }
    }

    /// Returns whether the domains of `self` and `other` intersect.
    pub fn shares_variable_with(&self, other: &Bindings) -> bool {
        self.iter().any(|(variable, _)| other.contains(variable))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.inner.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.inner.keys()
    }
}

impl FromIterator<(Variable, Term)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        Bindings {
            inner: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (variable, term)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{variable} -> {term}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn iri(value: &str) -> Term {
        NamedNode::new_unchecked(value).into()
    }

    #[test]
    fn bind_does_not_mutate_the_original() {
        let empty = Bindings::new();
        let bound = empty.bind(var("s"), iri("http://example.com/a"));
        assert!(empty.is_empty());
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn merge_of_compatible_bindings_is_the_union() {
        let left = Bindings::new().bind(var("s"), iri("http://example.com/a"));
        let right = Bindings::new()
            .bind(var("s"), iri("http://example.com/a"))
            .bind(var("o"), iri("http://example.com/b"));
        let merged = left.merge_with(&right).expect("compatible");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged, right.merge_with(&left).expect("compatible"));
    }

    #[test]
    fn merge_of_incompatible_bindings_is_none() {
        let left = Bindings::new().bind(var("s"), iri("http://example.com/a"));
        let right = Bindings::new().bind(var("s"), iri("http://example.com/b"));
        assert!(left.merge_with(&right).is_none());
    }

    #[test]
    fn disjoint_domains_are_always_compatible() {
        let left = Bindings::new().bind(var("s"), iri("http://example.com/a"));
        let right = Bindings::new().bind(var("o"), iri("http://example.com/b"));
        assert!(left.is_compatible_with(&right));
        assert!(!left.shares_variable_with(&right));
    }

    #[test]
    fn project_keeps_only_the_requested_variables() {
        let bindings = Bindings::new()
            .bind(var("s"), iri("http://example.com/a"))
            .bind(var("o"), iri("http://example.com/b"));
        let projected = bindings.project(&[var("s")]);
        assert_eq!(projected.len(), 1);
        assert!(projected.contains(&var("s")));
    }
}
