use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::normalize::{normalize_dynamic_path, NormalizeOptions};
use super::pattern::strip_query;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingStrategy {
    /// The path itself
    Exact,
    /// The normalized route pattern
    #[default]
    Normalized,
    /// The top-level segment, e.g. `/admin/*`
    Pattern,
}

#[derive(Debug, Clone)]
pub struct GroupingOptions {
    pub strategy: GroupingStrategy,
    pub min_group_size: usize,
    pub max_groups: Option<usize>,
    pub normalize: NormalizeOptions,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            strategy: GroupingStrategy::Normalized,
            min_group_size: 1,
            max_groups: None,
            normalize: NormalizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathGroup {
    pub key: String,
    pub members: Vec<String>,
}

fn group_key(path: &str, options: &GroupingOptions) -> String {
    match options.strategy {
        GroupingStrategy::Exact => path.to_string(),
        GroupingStrategy::Normalized => normalize_dynamic_path(path, &options.normalize),
        GroupingStrategy::Pattern => match strip_query(path).split('/').find(|s| !s.is_empty()) {
            Some(top) => format!("/{top}/*"),
            None => "/".to_string(),
        },
    }
}

/// Group paths by the configured strategy
///
/// Groups smaller than `min_group_size` are dropped. The result is sorted by
/// descending member count, ties in first-seen order, and then cut to
/// `max_groups`.
pub fn group_similar_paths<S: AsRef<str>>(paths: &[S], options: &GroupingOptions) -> Vec<PathGroup> {
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for path in paths.iter().map(AsRef::as_ref) {
        groups
            .entry(group_key(path, options))
            .or_default()
            .push(path.to_string());
    }

    let mut result: Vec<PathGroup> = groups
        .into_iter()
        .filter(|(_, members)| members.len() >= options.min_group_size)
        .map(|(key, members)| PathGroup { key, members })
        .collect();

    // Stable sort keeps first-seen order among equal sizes
    result.sort_by(|a, b| b.members.len().cmp(&a.members.len()));

    if let Some(max) = options.max_groups {
        result.truncate(max);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHS: &[&str] = &[
        "/users/1",
        "/posts/9",
        "/users/2",
        "/admin/settings",
        "/users/3",
        "/posts/10",
        "/admin/logs/today",
        "/about",
    ];

    fn keys(groups: &[PathGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.key.as_str()).collect()
    }

    #[test]
    fn test_normalized_grouping() {
        let groups = group_similar_paths(PATHS, &GroupingOptions::default());

        assert_eq!(groups[0].key, "/users/:id");
        assert_eq!(groups[0].members, vec!["/users/1", "/users/2", "/users/3"]);
        assert_eq!(groups[1].key, "/posts/:id");
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_pattern_grouping() {
        let options = GroupingOptions {
            strategy: GroupingStrategy::Pattern,
            ..GroupingOptions::default()
        };
        let groups = group_similar_paths(PATHS, &options);

        assert_eq!(keys(&groups), ["/users/*", "/posts/*", "/admin/*", "/about/*"]);
        assert_eq!(groups[2].members.len(), 2);
    }

    #[test]
    fn test_exact_grouping() {
        let options = GroupingOptions {
            strategy: GroupingStrategy::Exact,
            ..GroupingOptions::default()
        };
        let groups = group_similar_paths(&["/a", "/b", "/a"], &options);
        assert_eq!(keys(&groups), ["/a", "/b"]);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn test_min_group_size() {
        let options = GroupingOptions {
            min_group_size: 2,
            ..GroupingOptions::default()
        };
        let groups = group_similar_paths(PATHS, &options);

        assert_eq!(keys(&groups), ["/users/:id", "/posts/:id"]);
        assert!(groups.iter().all(|g| g.members.len() >= 2));
    }

    #[test]
    fn test_max_groups_keeps_largest() {
        let options = GroupingOptions {
            strategy: GroupingStrategy::Pattern,
            max_groups: Some(2),
            ..GroupingOptions::default()
        };
        let groups = group_similar_paths(PATHS, &options);

        // /posts and /admin tie at two members; /posts was seen first
        assert_eq!(keys(&groups), ["/users/*", "/posts/*"]);
    }

    #[test]
    fn test_output_is_ordered_by_size() {
        let groups = group_similar_paths(PATHS, &GroupingOptions::default());
        assert!(groups
            .windows(2)
            .all(|pair| pair[0].members.len() >= pair[1].members.len()));
    }
}
