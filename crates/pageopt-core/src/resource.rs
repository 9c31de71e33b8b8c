//! The resource data model and the append-only collection that indexes it.
//!
//! `Resource` is the contract the redirect resolver consumes; `StaticResource`
//! is a concrete, owned implementor so the crate's own tests (and callers who
//! don't already have their own HAR-backed type) have something to construct.
//! `ResourceCollection` owns a sequence of resources, indexes them by
//! canonical URL and host, and transitions once — irrevocably — from
//! "building" to "frozen", at which point `Registry()` becomes available.

use std::collections::HashMap;

use tracing::error;

use crate::error::AddRejected;
use crate::redirect::RedirectRegistry;
use crate::url_resolver::{UriResolver, UrlCrateResolver};

/// Whether a resource is a redirect (and to where) or a terminus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Redirect { target: Option<String> },
    Terminal,
}

/// The attributes the redirect resolver needs from an observed HTTP
/// resource. Callers with their own resource type (e.g. backed by a HAR
/// file or a live capture) implement this directly instead of going through
/// [`StaticResource`].
pub trait Resource {
    fn url(&self) -> &str;
    fn host(&self) -> &str;
    fn status(&self) -> i32;
    fn is_redirect(&self) -> bool;
    fn redirect_target(&self) -> Option<&str>;
    fn has_request_start_time(&self) -> bool;
    fn request_start_time_ms(&self) -> Option<u64>;

    /// Comparator used by the request-order view's stable sort. The default
    /// implementation compares the two timestamps directly; override it if
    /// a resource type has a cheaper or more precise ordering available.
    fn is_request_start_time_less_than(&self, other: &dyn Resource) -> bool {
        match (self.request_start_time_ms(), other.request_start_time_ms()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

/// A concrete, owned [`Resource`]: the type the crate's tests build directly
/// and a reasonable default for callers who just have a URL/status/timing
/// tuple lying around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResource {
    pub url: String,
    pub status: i32,
    pub start_time_ms: Option<u64>,
    pub kind: ResourceKind,
}

impl StaticResource {
    pub fn terminal(url: impl Into<String>, status: i32) -> Self {
        Self {
            url: url.into(),
            status,
            start_time_ms: None,
            kind: ResourceKind::Terminal,
        }
    }

    pub fn redirect(url: impl Into<String>, status: i32, target: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            start_time_ms: None,
            kind: ResourceKind::Redirect {
                target: Some(target.into()),
            },
        }
    }

    pub fn with_start_time_ms(mut self, ms: u64) -> Self {
        self.start_time_ms = Some(ms);
        self
    }
}

impl Resource for StaticResource {
    fn url(&self) -> &str {
        &self.url
    }

    fn host(&self) -> &str {
        host_of(&self.url)
    }

    fn status(&self) -> i32 {
        self.status
    }

    fn is_redirect(&self) -> bool {
        matches!(self.kind, ResourceKind::Redirect { .. })
    }

    fn redirect_target(&self) -> Option<&str> {
        match &self.kind {
            ResourceKind::Redirect { target } => target.as_deref(),
            ResourceKind::Terminal => None,
        }
    }

    fn has_request_start_time(&self) -> bool {
        self.start_time_ms.is_some()
    }

    fn request_start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }
}

fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority_end = without_scheme
        .find(['/', '?', '#'])
        .unwrap_or(without_scheme.len());
    &without_scheme[..authority_end]
}

/// Policy hook for accepting or rejecting resources as they're added.
pub trait ResourceFilter {
    fn is_accepted(&self, resource: &dyn Resource) -> bool;
}

/// The default filter: accept everything. Most callers that don't have a
/// specific exclusion policy use this.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllFilter;

impl ResourceFilter for AcceptAllFilter {
    fn is_accepted(&self, _resource: &dyn Resource) -> bool {
        true
    }
}

/// Append-only collection of observed resources. Mutable (`add`,
/// `set_primary_url`) until [`freeze`](Self::freeze) is called; read-only
/// and indexed thereafter.
pub struct ResourceCollection<F: ResourceFilter = AcceptAllFilter, R: UriResolver = UrlCrateResolver>
{
    resolver: R,
    filter: F,
    resources: Vec<Box<dyn Resource>>,
    by_canonical_url: HashMap<String, usize>,
    by_host: HashMap<String, Vec<usize>>,
    frozen: bool,
    request_order: Vec<usize>,
    primary_url: Option<String>,
    registry: Option<RedirectRegistry>,
}

impl ResourceCollection<AcceptAllFilter, UrlCrateResolver> {
    pub fn new() -> Self {
        Self::with_filter_and_resolver(AcceptAllFilter, UrlCrateResolver)
    }
}

impl Default for ResourceCollection<AcceptAllFilter, UrlCrateResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ResourceFilter, R: UriResolver> ResourceCollection<F, R> {
    pub fn with_filter_and_resolver(filter: F, resolver: R) -> Self {
        Self {
            resolver,
            filter,
            resources: Vec::new(),
            by_canonical_url: HashMap::new(),
            by_host: HashMap::new(),
            frozen: false,
            request_order: Vec::new(),
            primary_url: None,
            registry: None,
        }
    }

    fn canonicalize(&self, url: &str) -> String {
        self.resolver
            .canonicalize_url(url)
            .unwrap_or_else(|| url.to_string())
    }

    /// Add a resource. Rejects (and drops) the resource if the collection
    /// is frozen, the URL is empty, the canonical URL is already present,
    /// the status is non-positive, or the configured filter rejects it.
    pub fn add(&mut self, resource: Box<dyn Resource>) -> Result<(), AddRejected> {
        if self.frozen {
            error!("ResourceCollection::add called after freeze; rejecting");
            return Err(AddRejected::Frozen);
        }
        if resource.url().is_empty() {
            return Err(AddRejected::EmptyUrl);
        }
        if resource.status() <= 0 {
            return Err(AddRejected::InvalidStatus);
        }
        if !self.filter.is_accepted(resource.as_ref()) {
            return Err(AddRejected::FilteredOut);
        }
        let canonical = self.canonicalize(resource.url());
        if self.by_canonical_url.contains_key(&canonical) {
            return Err(AddRejected::Duplicate);
        }

        let index = self.resources.len();
        self.by_host
            .entry(resource.host().to_string())
            .or_default()
            .push(index);
        self.by_canonical_url.insert(canonical, index);
        self.resources.push(resource);
        Ok(())
    }

    /// Record the primary (landing-page) URL. Fails if frozen or if no
    /// resource with that canonical URL exists.
    pub fn set_primary_url(&mut self, url: &str) -> Result<(), AddRejected> {
        if self.frozen {
            error!("ResourceCollection::set_primary_url called after freeze; rejecting");
            return Err(AddRejected::Frozen);
        }
        let canonical = self.canonicalize(url);
        if !self.by_canonical_url.contains_key(&canonical) {
            return Err(AddRejected::EmptyUrl);
        }
        self.primary_url = Some(canonical);
        Ok(())
    }

    /// Transition to frozen: compute the request-order view (if every
    /// resource carries a start timestamp) and initialize the redirect
    /// registry. One-way; calling this twice is a programming error.
    pub fn freeze(&mut self) {
        if self.frozen {
            error!("ResourceCollection::freeze called twice; ignoring");
            return;
        }
        self.frozen = true;

        let all_timed = self.resources.iter().all(|r| r.has_request_start_time());
        if all_timed && !self.resources.is_empty() {
            let mut order: Vec<usize> = (0..self.resources.len()).collect();
            order.sort_by(|&a, &b| {
                let ra = self.resources[a].as_ref();
                let rb = self.resources[b].as_ref();
                if ra.is_request_start_time_less_than(rb) {
                    std::cmp::Ordering::Less
                } else if rb.is_request_start_time_less_than(ra) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            });
            self.request_order = order;
        }

        let primary_index = self.primary_index();
        let registry = RedirectRegistry::init(
            &self.resources,
            |url: &str| self.index_of_url(url),
            primary_index,
            &self.request_order,
        );
        self.registry = Some(registry);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn count(&self) -> usize {
        self.resources.len()
    }

    pub fn at(&self, index: usize) -> Option<&dyn Resource> {
        self.resources.get(index).map(|b| b.as_ref())
    }

    pub fn by_url(&self, url: &str) -> Option<&dyn Resource> {
        let canonical = self.canonicalize(url);
        self.by_canonical_url
            .get(&canonical)
            .and_then(|&i| self.at(i))
    }

    /// Indices into the collection, in request-start-time order. Empty if
    /// freeze ran without every resource carrying a timestamp.
    pub fn request_order(&self) -> &[usize] {
        &self.request_order
    }

    pub fn host_map(&self) -> &HashMap<String, Vec<usize>> {
        &self.by_host
    }

    pub fn primary(&self) -> Option<&dyn Resource> {
        self.primary_url.as_deref().and_then(|u| self.by_url(u))
    }

    pub fn registry(&self) -> Option<&RedirectRegistry> {
        self.registry.as_ref()
    }

    /// All resources in insertion order, for the graph/registry builders.
    pub(crate) fn resources(&self) -> &[Box<dyn Resource>] {
        &self.resources
    }

    pub(crate) fn index_of_url(&self, url: &str) -> Option<usize> {
        let canonical = self.canonicalize(url);
        self.by_canonical_url.get(&canonical).copied()
    }

    pub(crate) fn primary_index(&self) -> Option<usize> {
        self.primary_url
            .as_deref()
            .and_then(|u| self.by_canonical_url.get(u).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_scheme_and_path() {
        assert_eq!(host_of("https://example.com/a/b?x=1"), "example.com");
        assert_eq!(host_of("example.com/a"), "example.com");
    }

    #[test]
    fn rejects_empty_url_and_bad_status() {
        let mut c = ResourceCollection::new();
        assert_eq!(
            c.add(Box::new(StaticResource::terminal("", 200))),
            Err(AddRejected::EmptyUrl)
        );
        assert_eq!(
            c.add(Box::new(StaticResource::terminal("https://a.example/", 0))),
            Err(AddRejected::InvalidStatus)
        );
    }

    #[test]
    fn rejects_duplicate_canonical_url() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::terminal("https://a.example/", 200)))
            .unwrap();
        assert_eq!(
            c.add(Box::new(StaticResource::terminal(
                "https://a.example/#frag",
                200
            ))),
            Err(AddRejected::Duplicate)
        );
    }

    #[test]
    fn rejects_mutation_after_freeze() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(StaticResource::terminal("https://a.example/", 200)))
            .unwrap();
        c.freeze();
        assert_eq!(
            c.add(Box::new(StaticResource::terminal("https://b.example/", 200))),
            Err(AddRejected::Frozen)
        );
        assert_eq!(c.set_primary_url("https://a.example/"), Err(AddRejected::Frozen));
    }

    #[test]
    fn request_order_empty_without_full_timestamps() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(
            StaticResource::terminal("https://a.example/", 200).with_start_time_ms(5),
        ))
        .unwrap();
        c.add(Box::new(StaticResource::terminal("https://b.example/", 200)))
            .unwrap();
        c.freeze();
        assert!(c.request_order().is_empty());
    }

    #[test]
    fn request_order_stable_sorts_by_start_time() {
        let mut c = ResourceCollection::new();
        c.add(Box::new(
            StaticResource::terminal("https://b.example/", 200).with_start_time_ms(10),
        ))
        .unwrap();
        c.add(Box::new(
            StaticResource::terminal("https://a.example/", 200).with_start_time_ms(5),
        ))
        .unwrap();
        c.add(Box::new(
            StaticResource::terminal("https://c.example/", 200).with_start_time_ms(10),
        ))
        .unwrap();
        c.freeze();
        let order: Vec<&str> = c
            .request_order()
            .iter()
            .map(|&i| c.at(i).unwrap().url())
            .collect();
        // a (5) first, then b and c (both 10) preserving insertion order
        assert_eq!(order, vec!["https://a.example/", "https://b.example/", "https://c.example/"]);
    }
}
