use indexmap::IndexMap;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;

use super::normalize::is_uuid;

pub const NUMBER_PLACEHOLDER: &str = ":number";
pub const UUID_PLACEHOLDER: &str = ":uuid";
pub const LONG_STRING_PLACEHOLDER: &str = ":long_string";

pub const DEFAULT_LONG_STRING_THRESHOLD: usize = 20;

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Keep at most this many parameters; parsing stops once reached
    pub max_params: Option<usize>,
    /// Parameter names dropped before counting
    pub exclude_params: HashSet<String>,
    /// Values longer than this many characters become `:long_string`
    pub long_string_threshold: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_params: None,
            exclude_params: HashSet::new(),
            long_string_threshold: DEFAULT_LONG_STRING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnalysis {
    pub has_query: bool,
    pub param_count: usize,
    /// Decoded names to normalized values, in first-seen order
    pub params: IndexMap<String, String>,
    pub base_path: String,
}

/// Decode `application/x-www-form-urlencoded` text, never failing
fn decode_component(raw: &str) -> String {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// Optional sign, digits and at most one decimal point
fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    let mut seen_digit = false;
    let mut seen_dot = false;

    for b in digits.bytes() {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

fn normalize_value(value: String, options: &QueryOptions) -> String {
    if is_number(&value) {
        NUMBER_PLACEHOLDER.to_string()
    } else if is_uuid(&value) {
        UUID_PLACEHOLDER.to_string()
    } else if value.chars().count() > options.long_string_threshold {
        LONG_STRING_PLACEHOLDER.to_string()
    } else {
        value
    }
}

/// Split, decode and normalize the query string of a request target
///
/// Repeated names keep their first position and the last value.
pub fn analyze_query_parameters(path: &str, options: &QueryOptions) -> QueryAnalysis {
    let without_fragment = path.split_once('#').map_or(path, |(head, _)| head);
    let (base_path, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, query),
        None => (without_fragment, ""),
    };

    let limit = options.max_params.unwrap_or(usize::MAX);
    let mut params = IndexMap::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(raw_name);

        if name.is_empty() || options.exclude_params.contains(&name) {
            continue;
        }
        if params.len() >= limit && !params.contains_key(&name) {
            break;
        }

        let value = normalize_value(decode_component(raw_value), options);
        params.insert(name, value);
    }

    QueryAnalysis {
        has_query: !query.is_empty(),
        param_count: params.len(),
        params,
        base_path: base_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(path: &str) -> QueryAnalysis {
        analyze_query_parameters(path, &QueryOptions::default())
    }

    #[test]
    fn test_basic_query() {
        let result = analyze("/search?q=test&limit=10");

        assert!(result.has_query);
        assert_eq!(result.param_count, 2);
        assert_eq!(result.params["q"], "test");
        assert_eq!(result.params["limit"], ":number");
        assert_eq!(result.base_path, "/search");
    }

    #[test]
    fn test_no_query() {
        let result = analyze("/about");
        assert!(!result.has_query);
        assert_eq!(result.param_count, 0);
        assert_eq!(result.base_path, "/about");

        assert!(!analyze("/about?").has_query);
    }

    #[test]
    fn test_value_normalization() {
        let result = analyze(
            "/list?page=-2&price=9.99&ref=550e8400-e29b-41d4-a716-446655440000\
             &token=abcdefghijklmnopqrstuvwxyz&sort=name",
        );

        assert_eq!(result.params["page"], ":number");
        assert_eq!(result.params["price"], ":number");
        assert_eq!(result.params["ref"], ":uuid");
        assert_eq!(result.params["token"], ":long_string");
        assert_eq!(result.params["sort"], "name");
    }

    #[test]
    fn test_decoding() {
        let result = analyze("/search?q=hello+world&tag=caf%C3%A9&broken=%E0%A4");
        assert_eq!(result.params["q"], "hello world");
        assert_eq!(result.params["tag"], "café");
        assert!(result.params.contains_key("broken"));
    }

    #[test]
    fn test_excluded_params_are_not_counted() {
        let options = QueryOptions {
            exclude_params: ["utm_source".to_string(), "session".to_string()].into(),
            ..QueryOptions::default()
        };
        let result =
            analyze_query_parameters("/p?utm_source=mail&id=4&session=x&flag", &options);

        assert_eq!(result.param_count, 2);
        assert_eq!(result.params.keys().collect::<Vec<_>>(), ["id", "flag"]);
        assert_eq!(result.params["flag"], "");
    }

    #[test]
    fn test_max_params_caps_output() {
        let options = QueryOptions {
            max_params: Some(2),
            ..QueryOptions::default()
        };
        let result = analyze_query_parameters("/p?a=1&b=2&c=3&d=4", &options);

        assert_eq!(result.param_count, 2);
        assert_eq!(result.params.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_large_parameter_count() {
        let query: Vec<String> = (0..5000).map(|i| format!("k{i}=v")).collect();
        let path = format!("/bulk?{}", query.join("&"));

        assert_eq!(analyze(&path).param_count, 5000);
    }

    #[test]
    fn test_repeated_names() {
        let result = analyze("/f?a=x&b=y&a=z");
        assert_eq!(result.param_count, 2);
        assert_eq!(result.params["a"], "z");
    }
}
