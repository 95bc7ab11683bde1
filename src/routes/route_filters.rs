//! Declarative route specs compiled into query-layer filter predicates
//!
//! Nothing here evaluates a filter; the output is handed to whatever layer
//! queries stored records.

use serde::{Deserialize, Serialize};

use super::classify::RouteCategory;
use super::pattern::{compile_regex, glob_to_regex};
use super::RouteError;

/// One entry of a route filter list
///
/// Deserializes from `{"include": ".."}`, `{"exclude": ".."}`,
/// `{"category": ".."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteSpec {
    Include { include: String },
    Exclude { exclude: String },
    Category { category: String },
    Path(String),
}

/// A compiled predicate over stored route paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum RouteFilter {
    Contains(String),
    NotContains(String),
    /// Regex source
    Matches(String),
    NotMatches(String),
    MatchesAny(Vec<String>),
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Plain text becomes a substring test, globs become anchored regexes
fn compile_pattern(pattern: &str, negate: bool) -> Result<RouteFilter, RouteError> {
    if !has_wildcards(pattern) {
        let text = pattern.to_string();
        return Ok(if negate {
            RouteFilter::NotContains(text)
        } else {
            RouteFilter::Contains(text)
        });
    }

    let source = glob_to_regex(pattern);
    compile_regex(&source, pattern)?;
    Ok(if negate {
        RouteFilter::NotMatches(source)
    } else {
        RouteFilter::Matches(source)
    })
}

fn compile_spec(spec: &RouteSpec) -> Result<RouteFilter, RouteError> {
    match spec {
        RouteSpec::Include { include } | RouteSpec::Path(include) => compile_pattern(include, false),
        RouteSpec::Exclude { exclude } => compile_pattern(exclude, true),
        RouteSpec::Category { category } => {
            let category: RouteCategory = category.parse()?;
            Ok(RouteFilter::MatchesAny(category.regex_sources()))
        }
    }
}

/// Compile route specs into filter predicates, in order
///
/// Fails on the first unknown category or uncompilable pattern.
pub fn build_route_filters(specs: &[RouteSpec]) -> Result<Vec<RouteFilter>, RouteError> {
    specs.iter().map(compile_spec).collect()
}
