//! Semantic route categories
//!
//! Rules are matched on whole path segments, so a placeholder produced by
//! normalization never changes the category of a path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{IdHeuristic, RouteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Admin,
    Api,
    Auth,
    User,
    Dashboard,
    Docs,
    Other,
}

impl RouteCategory {
    pub const ALL: [RouteCategory; 7] = [
        RouteCategory::Admin,
        RouteCategory::Api,
        RouteCategory::Auth,
        RouteCategory::User,
        RouteCategory::Dashboard,
        RouteCategory::Docs,
        RouteCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteCategory::Admin => "admin",
            RouteCategory::Api => "api",
            RouteCategory::Auth => "auth",
            RouteCategory::User => "user",
            RouteCategory::Dashboard => "dashboard",
            RouteCategory::Docs => "docs",
            RouteCategory::Other => "other",
        }
    }

    /// Human-readable label for dashboards
    pub fn label(self) -> &'static str {
        match self {
            RouteCategory::Admin => "Admin",
            RouteCategory::Api => "API",
            RouteCategory::Auth => "Authentication",
            RouteCategory::User => "User Management",
            RouteCategory::Dashboard => "Dashboard",
            RouteCategory::Docs => "Documentation",
            RouteCategory::Other => "Other",
        }
    }

    /// Regex sources equivalent to this category's rule, for query layers
    ///
    /// `Other` has no rule of its own and yields an empty list.
    pub fn regex_sources(self) -> Vec<String> {
        RULES
            .iter()
            .filter(|rule| rule.category == self)
            .map(|rule| rule.matcher.regex_source())
            .collect()
    }
}

impl fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteCategory {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RouteError::UnknownCategory(s.to_string()))
    }
}

enum Matcher {
    /// First path segment is one of these
    FirstSegment(&'static [&'static str]),
    /// First path segment starts with one of these, unless it reads as an id
    FirstSegmentPrefix(&'static [&'static str]),
    /// Any path segment is one of these
    AnySegment(&'static [&'static str]),
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        match self {
            Matcher::FirstSegment(names) => segments.next().is_some_and(|s| names.contains(&s)),
            Matcher::FirstSegmentPrefix(prefixes) => segments.next().is_some_and(|s| {
                prefixes.iter().any(|p| s.starts_with(p)) && !IdHeuristic::default().matches(s)
            }),
            Matcher::AnySegment(names) => segments.any(|s| names.contains(&s)),
        }
    }

    /// Prefix sources cannot express the id exclusion and match slightly more
    fn regex_source(&self) -> String {
        let (names, anchor, rest) = match self {
            Matcher::FirstSegment(names) => (names, "^/", ""),
            Matcher::FirstSegmentPrefix(names) => (names, "^/", "[^/?]*"),
            Matcher::AnySegment(names) => (names, "(?:^|/)", ""),
        };
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        format!("{anchor}(?:{alternation}){rest}(?:/|\\?|$)")
    }
}

struct Rule {
    category: RouteCategory,
    matcher: Matcher,
}

/// Ordered, first match wins
const RULES: &[Rule] = &[
    Rule {
        category: RouteCategory::Admin,
        matcher: Matcher::FirstSegmentPrefix(&["admin"]),
    },
    Rule {
        category: RouteCategory::Api,
        matcher: Matcher::FirstSegment(&["api"]),
    },
    Rule {
        category: RouteCategory::Auth,
        matcher: Matcher::AnySegment(&[
            "login", "logout", "register", "signin", "signout", "signup", "auth", "oauth",
        ]),
    },
    Rule {
        category: RouteCategory::User,
        matcher: Matcher::AnySegment(&["users", "user", "profile", "profiles"]),
    },
    Rule {
        category: RouteCategory::Dashboard,
        matcher: Matcher::AnySegment(&["dashboard"]),
    },
    Rule {
        category: RouteCategory::Docs,
        matcher: Matcher::AnySegment(&["docs", "documentation"]),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteClassification {
    pub category: RouteCategory,
    pub label: &'static str,
}

/// Classify a path into a semantic category
///
/// Matching is case-sensitive and ignores any query string.
pub fn classify_route(path: &str) -> RouteClassification {
    let path = super::pattern::strip_query(path);
    let category = RULES
        .iter()
        .find(|rule| rule.matcher.matches(path))
        .map_or(RouteCategory::Other, |rule| rule.category);

    RouteClassification {
        category,
        label: category.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(path: &str) -> RouteCategory {
        classify_route(path).category
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(category("/admin/settings"), RouteCategory::Admin);
        assert_eq!(category("/api/v1/orders"), RouteCategory::Api);
        assert_eq!(category("/login"), RouteCategory::Auth);
        assert_eq!(category("/account/logout"), RouteCategory::Auth);
        assert_eq!(category("/auth/callback"), RouteCategory::Auth);
        assert_eq!(category("/users/42"), RouteCategory::User);
        assert_eq!(category("/me/profile"), RouteCategory::User);
        assert_eq!(category("/dashboard"), RouteCategory::Dashboard);
        assert_eq!(category("/help/docs/start"), RouteCategory::Docs);
        assert_eq!(category("/pricing"), RouteCategory::Other);
        assert_eq!(category("/"), RouteCategory::Other);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(category("/admin/users"), RouteCategory::Admin);
        assert_eq!(category("/api/login"), RouteCategory::Api);
        assert_eq!(category("/users/dashboard"), RouteCategory::User);
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(category("/Admin"), RouteCategory::Other);
        assert_eq!(category("/API/orders"), RouteCategory::Other);
    }

    #[test]
    fn test_whole_segments_only() {
        assert_eq!(category("/users/login123"), RouteCategory::User);
        assert_eq!(category("/apiary"), RouteCategory::Other);
        assert_eq!(category("/blog/authors"), RouteCategory::Other);
    }

    #[test]
    fn test_admin_prefixed_first_segment() {
        assert_eq!(category("/admin-panel"), RouteCategory::Admin);
        assert_eq!(category("/administrator/users"), RouteCategory::Admin);
        assert_eq!(category("/adminpanel/logs"), RouteCategory::Admin);
        assert_eq!(category("/settings/admin-panel"), RouteCategory::Other);
        // Reads as an id, so it stays with its normalized form
        assert_eq!(category("/admin-2024"), RouteCategory::Other);
    }

    #[test]
    fn test_auth_keyword_in_any_segment() {
        assert_eq!(category("/v1/auth/token"), RouteCategory::Auth);
        assert_eq!(category("/connect/oauth/authorize"), RouteCategory::Auth);
        assert_eq!(category("/api/auth/token"), RouteCategory::Api);
    }

    #[test]
    fn test_labels() {
        assert_eq!(classify_route("/api").label, "API");
        assert_eq!(classify_route("/signin").label, "Authentication");
        assert_eq!(classify_route("/users").label, "User Management");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Dashboard".parse::<RouteCategory>().unwrap(), RouteCategory::Dashboard);
        assert!(matches!(
            "billing".parse::<RouteCategory>(),
            Err(RouteError::UnknownCategory(name)) if name == "billing"
        ));
    }

    #[test]
    fn test_regex_sources_agree_with_rules() {
        let sources = RouteCategory::Auth.regex_sources();
        assert_eq!(sources.len(), 1);

        let set = regex::RegexSet::new(&sources).unwrap();
        assert!(set.is_match("/account/login"));
        assert!(set.is_match("/auth/callback?code=1"));
        assert!(set.is_match("/v1/auth/token"));

        let admin = regex::Regex::new(&RouteCategory::Admin.regex_sources()[0]).unwrap();
        assert!(admin.is_match("/admin-panel/users"));
        assert!(!admin.is_match("/settings/admin"));
        assert!(!set.is_match("/blog/loginless"));
        assert!(RouteCategory::Other.regex_sources().is_empty());
    }
}
