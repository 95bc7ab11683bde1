//! Dynamic segment collapsing
//!
//! Each segment is tested in order against the numeric rule, the UUID rule,
//! the [`IdHeuristic`] and finally any caller-supplied patterns. A match is
//! replaced by `:id`, or `:file.<ext>` when extensions are preserved.

use regex::Regex;

use super::pattern::{compile_regex, strip_query};
use super::RouteError;

pub const ID_PLACEHOLDER: &str = ":id";
pub const FILE_PLACEHOLDER: &str = ":file";

/// Policy for the "looks like an identifier" rule
///
/// A segment qualifies when it is made of ASCII letters, digits, `-` and `_`
/// only, is at least `min_length` long and contains at least `min_digits`
/// digits. Slugs such as `post-2` stay verbatim while `a1b2c3` and
/// `order_2024_11` collapse; words like `base64` are false positives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdHeuristic {
    pub enabled: bool,
    pub min_length: usize,
    pub min_digits: usize,
}

impl Default for IdHeuristic {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: 6,
            min_digits: 2,
        }
    }
}

impl IdHeuristic {
    pub fn matches(&self, segment: &str) -> bool {
        if !self.enabled || segment.len() < self.min_length {
            return false;
        }

        let mut digits = 0;
        for b in segment.bytes() {
            match b {
                b'0'..=b'9' => digits += 1,
                b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_' => {}
                _ => return false,
            }
        }
        digits >= self.min_digits
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub preserve_extensions: bool,
    /// Keep at most this many leading segments
    pub max_segments: Option<usize>,
    pub heuristic: IdHeuristic,
    /// Extra identifier rules, each anchored to the whole segment
    pub id_patterns: Vec<Regex>,
}

impl NormalizeOptions {
    /// Compile caller-supplied identifier regexes
    pub fn with_id_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, RouteError> {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let anchored = format!("^(?:{pattern})$");
            self.id_patterns.push(compile_regex(&anchored, pattern)?);
        }
        Ok(self)
    }
}

pub fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Canonical 8-4-4-4-12 hex layout, any case
pub fn is_uuid(segment: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    segment.len() == 36
        && segment
            .split('-')
            .map(|group| group.len())
            .eq(GROUPS.iter().copied())
        && segment.bytes().all(|b| b == b'-' || b.is_ascii_hexdigit())
}

fn is_identifier(segment: &str, options: &NormalizeOptions) -> bool {
    is_numeric(segment)
        || is_uuid(segment)
        || options.heuristic.matches(segment)
        || options.id_patterns.iter().any(|re| re.is_match(segment))
}

/// Split `report.pdf` into `("report", "pdf")` when it has a plausible extension
fn split_extension(segment: &str) -> Option<(&str, &str)> {
    let (stem, ext) = segment.rsplit_once('.')?;
    let plausible = !stem.is_empty()
        && (1..=8).contains(&ext.len())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    plausible.then_some((stem, ext))
}

fn normalize_segment(segment: &str, options: &NormalizeOptions) -> String {
    if is_identifier(segment, options) {
        return ID_PLACEHOLDER.to_string();
    }

    match split_extension(segment) {
        Some((stem, ext)) if is_identifier(stem, options) => {
            if options.preserve_extensions {
                format!("{FILE_PLACEHOLDER}.{ext}")
            } else {
                ID_PLACEHOLDER.to_string()
            }
        }
        _ => segment.to_string(),
    }
}

/// Collapse dynamic segments of a path into placeholders
///
/// The query string is dropped and empty segments are removed, so
/// `/users//42/` and `/users/42` yield the same pattern.
pub fn normalize_dynamic_path(path: &str, options: &NormalizeOptions) -> String {
    let limit = options.max_segments.unwrap_or(usize::MAX);

    let segments: Vec<String> = strip_query(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .take(limit)
        .map(|s| normalize_segment(s, options))
        .collect();

    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(path: &str) -> String {
        normalize_dynamic_path(path, &NormalizeOptions::default())
    }

    #[test]
    fn test_numeric_segments() {
        assert_eq!(normalize("/users/123"), "/users/:id");
        assert_eq!(normalize("/posts/456/comments/789"), "/posts/:id/comments/:id");
    }

    #[test]
    fn test_uuid_segments() {
        assert_eq!(
            normalize("/orders/550e8400-e29b-41d4-a716-446655440000/items"),
            "/orders/:id/items"
        );
        assert_eq!(
            normalize("/orders/550E8400-E29B-41D4-A716-446655440000"),
            "/orders/:id"
        );
        assert!(!is_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!is_uuid("zzzzzzzz-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn test_heuristic_policy() {
        assert_eq!(normalize("/p/a1b2c3"), "/p/:id");
        assert_eq!(normalize("/posts/post123"), "/posts/:id");
        assert_eq!(normalize("/posts/hello-world"), "/posts/hello-world");
        assert_eq!(normalize("/blog/post-2"), "/blog/post-2");
        assert_eq!(normalize("/api/v2/users"), "/api/v2/users");
    }

    #[test]
    fn test_heuristic_can_be_disabled() {
        let options = NormalizeOptions {
            heuristic: IdHeuristic {
                enabled: false,
                ..IdHeuristic::default()
            },
            ..NormalizeOptions::default()
        };
        assert_eq!(normalize_dynamic_path("/p/a1b2c3/7", &options), "/p/a1b2c3/:id");
    }

    #[test]
    fn test_custom_patterns() {
        let options = NormalizeOptions::default()
            .with_id_patterns(&["[a-z]{3}-[a-z]{3}"])
            .unwrap();

        assert_eq!(normalize_dynamic_path("/rooms/abc-def", &options), "/rooms/:id");
        // Anchored to the whole segment
        assert_eq!(normalize_dynamic_path("/rooms/abc-defg", &options), "/rooms/abc-defg");
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let err = NormalizeOptions::default().with_id_patterns(&["(unclosed"]).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_extensions() {
        assert_eq!(normalize("/files/12345.pdf"), "/files/:id");
        assert_eq!(normalize("/files/readme.pdf"), "/files/readme.pdf");

        let options = NormalizeOptions {
            preserve_extensions: true,
            ..NormalizeOptions::default()
        };
        assert_eq!(normalize_dynamic_path("/files/12345.pdf", &options), "/files/:file.pdf");
        assert_eq!(normalize_dynamic_path("/files/99", &options), "/files/:id");
    }

    #[test]
    fn test_max_segments() {
        let options = NormalizeOptions {
            max_segments: Some(2),
            ..NormalizeOptions::default()
        };
        assert_eq!(
            normalize_dynamic_path("/api/users/42/posts/7", &options),
            "/api/users"
        );
        assert_eq!(normalize_dynamic_path("/users/42", &options), "/users/:id");
    }

    #[test]
    fn test_query_and_empty_segments() {
        assert_eq!(normalize("/users//42/?tab=posts"), "/users/:id");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_deterministic() {
        let options = NormalizeOptions::default();
        let path = "/shop/items/8812/reviews/a9f3e2c1";
        assert_eq!(
            normalize_dynamic_path(path, &options),
            normalize_dynamic_path(path, &options)
        );
    }
}
