use super::pattern::{strip_query, PatternSet};

pub const DEFAULT_MAX_LENGTH: usize = 2000;

const STATIC_DIRS: &[&str] = &[
    "/assets/",
    "/static/",
    "/images/",
    "/img/",
    "/css/",
    "/js/",
    "/fonts/",
    "/_next/static/",
    "/build/",
    "/dist/",
];

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif", "bmp",
    "woff", "woff2", "ttf", "otf", "eot", "mp4", "webm", "mp3", "wav", "ogg",
];

const ROOT_FILES: &[&str] = &[
    "/favicon.ico",
    "/robots.txt",
    "/apple-touch-icon.png",
    "/manifest.json",
    "/browserconfig.xml",
];

/// Options for [`filter_trackable_paths`]
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Maximum path length in bytes, query string included
    pub max_length: usize,
    pub exclude_static_assets: bool,
    pub exclude: PatternSet,
    /// Paths matching these are kept even when excluded
    pub include: PatternSet,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            exclude_static_assets: true,
            exclude: PatternSet::default(),
            include: PatternSet::default(),
        }
    }
}

/// Known asset directory, asset extension or well-known root file
pub fn is_static_asset(path: &str) -> bool {
    let path = strip_query(path);

    if ROOT_FILES.contains(&path) || STATIC_DIRS.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }

    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Whether a single path should be tracked
pub fn is_trackable(path: &str, options: &FilterOptions) -> bool {
    if path.is_empty() || !path.starts_with('/') || path.len() > options.max_length {
        return false;
    }

    let base = strip_query(path);
    let excluded = (options.exclude_static_assets && is_static_asset(base))
        || options.exclude.is_match(base);

    !excluded || options.include.is_match(base)
}

/// Keep only the paths worth tracking, in input order
///
/// Invalid paths are dropped individually; the batch never fails.
pub fn filter_trackable_paths<S: AsRef<str>>(paths: &[S], options: &FilterOptions) -> Vec<String> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|path| is_trackable(path, options))
        .map(str::to_string)
        .collect()
}
