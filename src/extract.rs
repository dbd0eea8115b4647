// src/extract.rs
//! Field extraction: resolves config values that are either literals or
//! `$`-prefixed path expressions against the feed/entry trees.
//!
//! ```text
//! "$entry.title"            -> entry["title"]
//! "$feed.image.href"        -> feed["image"]["href"]
//! "$entry.media_thumbnail.0.url"  -> first element of an array, then "url"
//! 16711680                  -> literal, returned unchanged
//! "Release notes"           -> literal, returned unchanged
//! ```
//!
//! Lookups never fail: a missing key or an unknown scope yields [`Extracted::Absent`].

use serde_json::Value;

const SIGIL: char = '$';

/// Which tree a path expression walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Entry,
    Feed,
}

impl Scope {
    fn from_step(step: &str) -> Option<Self> {
        match step {
            "entry" => Some(Self::Entry),
            "feed" => Some(Self::Feed),
            _ => None,
        }
    }
}

/// The two trees a path expression may select from.
#[derive(Debug, Clone, Copy)]
pub struct Scopes<'a> {
    pub feed: &'a Value,
    pub entry: &'a Value,
}

impl<'a> Scopes<'a> {
    pub fn new(feed: &'a Value, entry: &'a Value) -> Self {
        Self { feed, entry }
    }

    fn root(&self, scope: Scope) -> &'a Value {
        match scope {
            Scope::Entry => self.entry,
            Scope::Feed => self.feed,
        }
    }
}

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extracted<'a> {
    Found(&'a Value),
    Absent,
}

impl<'a> Extracted<'a> {
    pub fn found(self) -> Option<&'a Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Scalar rendered as text. Null, mappings and arrays have no text form.
    pub fn text(self) -> Option<String> {
        match self.found()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// A parsed `$scope.step.step` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr<'e> {
    /// `None` when the first step names neither `entry` nor `feed`.
    pub scope: Option<Scope>,
    pub steps: Vec<&'e str>,
}

impl<'e> PathExpr<'e> {
    /// Parses a path expression; `None` means the string is a literal.
    pub fn parse(expr: &'e str) -> Option<Self> {
        let rest = expr.strip_prefix(SIGIL)?;
        let mut steps = rest.split('.');
        let scope = steps.next().and_then(Scope::from_step);
        Some(Self {
            scope,
            steps: steps.collect(),
        })
    }

    /// Walks the expression over `scopes`.
    pub fn eval<'a>(&self, scopes: &Scopes<'a>) -> Extracted<'a> {
        let Some(scope) = self.scope else {
            return Extracted::Absent;
        };
        walk(scopes.root(scope), &self.steps)
    }
}

/// Resolves a field-mapping value: literals pass through, path expressions are walked.
pub fn extract<'a>(scopes: &Scopes<'a>, expr: &'a Value) -> Extracted<'a> {
    match expr {
        Value::String(s) => match PathExpr::parse(s) {
            Some(path) => path.eval(scopes),
            None => Extracted::Found(expr),
        },
        other => Extracted::Found(other),
    }
}

fn walk<'a>(root: &'a Value, steps: &[&str]) -> Extracted<'a> {
    let mut branch = root;
    for step in steps {
        let next = match branch {
            Value::Object(map) => map.get(*step),
            Value::Array(items) => step.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => branch = v,
            None => return Extracted::Absent,
        }
    }
    Extracted::Found(branch)
}
