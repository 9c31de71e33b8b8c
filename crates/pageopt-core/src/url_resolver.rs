//! URI resolution and canonicalization — an external collaborator interface.
//!
//! The crate treats URI canonicalization as out of scope for the redirect
//! resolver proper (per spec.md §1); what it needs is a stable contract for
//! "resolve this `Location` header against its request URL" and "reduce a
//! URL to its canonical, fragment-free form". [`UriResolver`] is that
//! contract. [`UrlCrateResolver`] is a real, usable default built on the
//! `url` crate, but callers may supply their own.

use url::Url;

/// Resolves and canonicalizes URLs on behalf of the redirect resolver.
pub trait UriResolver {
    /// Resolve a `Location` header value against the URL that produced it.
    /// Returns `None` if resolution fails (malformed base or location).
    fn resolve_relative(&self, base_url: &str, location: &str) -> Option<String>;

    /// Canonicalize a URL: normalize scheme/authority/path/query and strip
    /// any fragment. Returns `None` if `url` cannot be parsed at all.
    fn canonicalize_url(&self, url: &str) -> Option<String>;

    /// Strip the fragment (`#...`) from a URL, leaving everything else
    /// untouched. Unlike [`canonicalize_url`](Self::canonicalize_url), this
    /// never fails: a URL with no recognizable fragment delimiter is
    /// returned unchanged.
    fn strip_fragment(&self, url: &str) -> String;
}

/// Default [`UriResolver`] backed by the `url` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlCrateResolver;

impl UriResolver for UrlCrateResolver {
    fn resolve_relative(&self, base_url: &str, location: &str) -> Option<String> {
        let base = Url::parse(base_url).ok()?;
        let resolved = base.join(location).ok()?;
        Some(resolved.into())
    }

    fn canonicalize_url(&self, url: &str) -> Option<String> {
        let mut parsed = Url::parse(url).ok()?;
        parsed.set_fragment(None);
        Some(parsed.into())
    }

    fn strip_fragment(&self, url: &str) -> String {
        match url.find('#') {
            Some(idx) => url[..idx].to_string(),
            None => url.to_string(),
        }
    }
}
