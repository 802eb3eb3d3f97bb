//! Route matching
//!
//! Radix-trie matching (matchit) behind the LRU route cache: repeated
//! (method, path) pairs are answered from the cache in O(1); misses walk the
//! trie and populate the cache on the way out.
//!
//! Supports static paths (`/users`), dynamic segments (`/users/{id}`) and
//! wildcards (`/files/{*path}`).

use crate::cache::{CacheStats, Params, RouteCache};
use crate::error::{Error, Result};
use crate::event::Method;

/// Route match result
#[derive(Debug, Clone)]
pub struct RouteMatch<T> {
    /// The matched handler/value
    pub value: T,
    /// Captured path parameters
    pub params: Params,
}

/// HTTP router with per-method tries and a match cache.
pub struct Router<T> {
    // One trie per method for O(1) method dispatch
    tries: [matchit::Router<T>; Method::COUNT],
    cache: RouteCache<T>,
}

impl<T: Clone> Router<T> {
    /// Create a router with the default cache capacity
    pub fn new() -> Self {
        Self {
            tries: std::array::from_fn(|_| matchit::Router::new()),
            cache: RouteCache::new(),
        }
    }

    /// Create a router with an explicit cache capacity (zero disables
    /// caching in effect)
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            tries: std::array::from_fn(|_| matchit::Router::new()),
            cache: RouteCache::with_capacity(capacity),
        }
    }

    /// Add a route
    pub fn route(&mut self, method: Method, path: &str, value: T) -> Result<()> {
        self.tries[method.index()]
            .insert(path, value)
            .map_err(|e| Error::InvalidPath(e.to_string()))
    }

    /// Add a GET route
    pub fn get(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Get, path, value)
    }

    /// Add a POST route
    pub fn post(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Post, path, value)
    }

    /// Add a PUT route
    pub fn put(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Put, path, value)
    }

    /// Add a DELETE route
    pub fn delete(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Delete, path, value)
    }

    /// Add a PATCH route
    pub fn patch(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Patch, path, value)
    }

    /// Match a request, consulting and populating the cache.
    pub fn find(&mut self, method: Method, path: &str) -> Option<RouteMatch<T>> {
        if let Some(entry) = self.cache.get(method, path) {
            return Some(RouteMatch {
                value: entry.handler.clone(),
                params: entry.params.clone(),
            });
        }

        let matched = self.match_trie(method, path)?;
        self.cache
            .put(method, path, matched.value.clone(), matched.params.clone());
        Some(matched)
    }

    /// Trie walk without the cache. HEAD falls back to GET.
    fn match_trie(&self, method: Method, path: &str) -> Option<RouteMatch<T>> {
        let direct = Self::trie_at(&self.tries[method.index()], path);
        if direct.is_some() {
            return direct;
        }
        if method == Method::Head {
            return Self::trie_at(&self.tries[Method::Get.index()], path);
        }
        None
    }

    fn trie_at(trie: &matchit::Router<T>, path: &str) -> Option<RouteMatch<T>> {
        trie.at(path).ok().map(|matched| {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            RouteMatch {
                value: matched.value.clone(),
                params,
            }
        })
    }

    /// Route-cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached match
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl<T: Clone> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        let mut router: Router<&str> = Router::new();
        router.get("/", "home").unwrap();
        router.get("/users", "users").unwrap();
        router.post("/users", "create_user").unwrap();

        assert_eq!(router.find(Method::Get, "/").unwrap().value, "home");
        assert_eq!(router.find(Method::Get, "/users").unwrap().value, "users");
        assert_eq!(router.find(Method::Post, "/users").unwrap().value, "create_user");
        assert!(router.find(Method::Delete, "/users").is_none());
    }

    #[test]
    fn test_dynamic_routes() {
        let mut router: Router<&str> = Router::new();
        router.get("/users/{id}", "get_user").unwrap();
        router.get("/users/{id}/posts/{post_id}", "get_post").unwrap();

        let m = router.find(Method::Get, "/users/123").unwrap();
        assert_eq!(m.value, "get_user");
        assert_eq!(m.params[0], ("id".to_string(), "123".to_string()));

        let m = router.find(Method::Get, "/users/456/posts/789").unwrap();
        assert_eq!(m.value, "get_post");
        assert!(m.params.contains(&("id".to_string(), "456".to_string())));
        assert!(m.params.contains(&("post_id".to_string(), "789".to_string())));
    }

    #[test]
    fn test_wildcard_routes() {
        let mut router: Router<&str> = Router::new();
        router.get("/files/{*path}", "serve_file").unwrap();

        let m = router.find(Method::Get, "/files/docs/readme.md").unwrap();
        assert_eq!(m.value, "serve_file");
        assert_eq!(m.params[0], ("path".to_string(), "docs/readme.md".to_string()));
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let mut router: Router<&str> = Router::new();
        router.get("/resource", "get_resource").unwrap();

        let m = router.find(Method::Head, "/resource").unwrap();
        assert_eq!(m.value, "get_resource");
    }

    #[test]
    fn test_find_populates_cache() {
        let mut router: Router<&str> = Router::new();
        router.get("/users/{id}", "get_user").unwrap();

        router.find(Method::Get, "/users/7").unwrap();
        let stats = router.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);

        let m = router.find(Method::Get, "/users/7").unwrap();
        assert_eq!(m.value, "get_user");
        assert_eq!(m.params[0], ("id".to_string(), "7".to_string()));
        assert_eq!(router.cache_stats().hits, 1);
    }

    #[test]
    fn test_not_found_is_not_cached() {
        let mut router: Router<&str> = Router::new();
        router.get("/known", "known").unwrap();

        assert!(router.find(Method::Get, "/unknown").is_none());
        assert!(router.find(Method::Get, "/unknown").is_none());
        let stats = router.cache_stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut router: Router<&str> = Router::new();
        router.get("/users/{id}", "a").unwrap();
        // Conflicting pattern on the same path
        assert!(matches!(
            router.get("/users/{id}", "b"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_clear_cache() {
        let mut router: Router<&str> = Router::new();
        router.get("/a", "a").unwrap();
        router.find(Method::Get, "/a").unwrap();
        assert_eq!(router.cache_stats().size, 1);

        router.clear_cache();
        assert_eq!(router.cache_stats().size, 0);
    }
}
