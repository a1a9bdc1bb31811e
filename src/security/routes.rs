//! Path classification for the security pipeline.
//!
//! # Design Decisions
//! - Prefix matching only, no regex in the hot path
//! - A route entry matches itself and its sub-paths, never siblings
//!   (`/about` matches `/about/team` but not `/aboutus`)
//! - Classification only runs on canonical paths; see [`is_canonical_path`]

use crate::config::SecurityConfig;

const API_PREFIX: &str = "/api/";

/// Compiled route classes, built once from [`SecurityConfig`].
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    public_routes: Vec<String>,
    asset_prefixes: Vec<String>,
    anonymous_api_prefixes: Vec<String>,
}

impl RouteClassifier {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            public_routes: config.public_routes.clone(),
            asset_prefixes: config.asset_prefixes.clone(),
            anonymous_api_prefixes: config.anonymous_api_prefixes.clone(),
        }
    }

    /// Static files: asset prefixes, or any path whose last segment has an extension.
    pub fn is_static_asset(&self, path: &str) -> bool {
        if self.asset_prefixes.iter().any(|p| matches_route(path, p)) {
            return true;
        }
        path.rsplit('/')
            .next()
            .map(|segment| segment.contains('.'))
            .unwrap_or(false)
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|r| matches_route(path, r))
    }

    pub fn is_api(&self, path: &str) -> bool {
        path.starts_with(API_PREFIX)
    }

    /// API routes that are rate limited but need neither API key nor bearer token.
    pub fn is_anonymous_api(&self, path: &str) -> bool {
        self.is_api(path)
            && self
                .anonymous_api_prefixes
                .iter()
                .any(|p| matches_route(path, p))
    }
}

/// False for paths an upstream could resolve differently than the prefix
/// matchers see them: `.`/`..` segments, backslashes, and percent-encoded
/// dots, slashes or backslashes.
pub fn is_canonical_path(path: &str) -> bool {
    if path.contains('\\') {
        return false;
    }
    let lower = path.to_ascii_lowercase();
    if ["%2e", "%2f", "%5c"].iter().any(|enc| lower.contains(enc)) {
        return false;
    }
    !path.split('/').any(|segment| segment == "." || segment == "..")
}

/// True when `path` equals `route` or is one of its sub-paths.
pub fn matches_route(path: &str, route: &str) -> bool {
    if route == "/" {
        return path == "/";
    }
    let route = route.trim_end_matches('/');
    match path.strip_prefix(route) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Rate limit bucket for an API path: its second segment, or `default`.
///
/// `/api/contact/submit` → `contact`, `/api/` → `default`.
pub fn route_segment(path: &str) -> &str {
    path.split('/')
        .nth(2)
        .filter(|s| !s.is_empty())
        .unwrap_or("default")
}
