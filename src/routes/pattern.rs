//! Glob patterns for caller-supplied include/exclude lists
//!
//! `*` matches within one segment, `**` matches across segments (including
//! none, so `/a/**/b` matches `/a/b`) and `?` matches a single non-slash
//! character. A pattern that does not start with `/` may match the tail of a
//! path, so `*.php` matches `/a/b/index.php`.

use regex::{Regex, RegexSet};

use super::RouteError;

/// Path portion of a request target, without query string or fragment
pub fn strip_query(path: &str) -> &str {
    path.find(['?', '#']).map_or(path, |idx| &path[..idx])
}

/// Translate a glob into an anchored regular expression
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 16);
    out.push('^');
    if !glob.starts_with('/') {
        out.push_str("(?:.*/)?");
    }

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `/**/` also matches a single slash
                if out.ends_with('/') && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }

    out.push('$');
    out
}

/// Compile a single regex, attributing failures to the caller's pattern
pub fn compile_regex(source: &str, pattern: &str) -> Result<Regex, RouteError> {
    Regex::new(source).map_err(|source| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A compiled list of glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    globs: Vec<String>,
    set: RegexSet,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            globs: Vec::new(),
            set: RegexSet::empty(),
        }
    }
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(globs: &[S]) -> Result<Self, RouteError> {
        let sources = globs
            .iter()
            .map(|g| {
                let source = glob_to_regex(g.as_ref());
                // Surface the offending glob rather than a set-level error
                compile_regex(&source, g.as_ref()).map(|_| source)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let set = RegexSet::new(&sources).map_err(|source| RouteError::InvalidPattern {
            pattern: globs
                .iter()
                .map(|g| g.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;

        Ok(Self {
            globs: globs.iter().map(|g| g.as_ref().to_string()).collect(),
            set,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        !self.globs.is_empty() && self.set.is_match(path)
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("/search?q=1"), "/search");
        assert_eq!(strip_query("/docs#intro"), "/docs");
        assert_eq!(strip_query("/plain"), "/plain");
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let set = PatternSet::compile(&["/admin/*"]).unwrap();
        assert!(set.is_match("/admin/users"));
        assert!(!set.is_match("/admin/users/1"));
        assert!(!set.is_match("/administrator"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let set = PatternSet::compile(&["/internal/**"]).unwrap();
        assert!(set.is_match("/internal/a/b/c"));
        assert!(!set.is_match("/public/internal/a"));
    }

    #[test]
    fn test_inner_double_star_matches_zero_segments() {
        let set = PatternSet::compile(&["/a/**/b"]).unwrap();
        assert!(set.is_match("/a/b"));
        assert!(set.is_match("/a/x/b"));
        assert!(set.is_match("/a/x/y/b"));
        assert!(!set.is_match("/a/xb"));
        assert_eq!(glob_to_regex("/a/**/b"), "^/a/(?:.*/)?b$");
    }

    #[test]
    fn test_relative_glob_matches_tail() {
        let set = PatternSet::compile(&["*.php"]).unwrap();
        assert!(set.is_match("/index.php"));
        assert!(set.is_match("/a/b/index.php"));
        assert!(!set.is_match("/index.phpx"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let set = PatternSet::compile(&["/v1.0/(beta)"]).unwrap();
        assert!(set.is_match("/v1.0/(beta)"));
        assert!(!set.is_match("/v1x0/(beta)"));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = PatternSet::default();
        assert!(set.is_empty());
        assert!(!set.is_match("/anything"));
    }
}
