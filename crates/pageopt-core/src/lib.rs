//! Analysis core of a page-optimization toolkit: a heuristic JavaScript
//! minifier and a redirect-chain resolver.
//!
//! The two subsystems are independent and are exposed as separate modules:
//!
//! - [`minify`] — single-pass, heuristic JS minification (no AST, no
//!   source maps). Start with [`minify::minify`].
//! - [`resource`] and [`redirect`] — an append-only, freeze-once resource
//!   store and the redirect-chain graph/registry built on top of it once
//!   frozen. Start with [`resource::ResourceCollection`].
//! - [`url_resolver`] — the URI-canonicalization collaborator interface the
//!   resource store depends on.
//! - [`image`] — a thin collaborator surface for the PNG/JPEG/WebP
//!   conversions the toolkit's scoring layer calls into; not part of the
//!   analysis core proper (see module docs).
//!
//! Nothing in this crate performs I/O, blocks, or spawns work off the
//! caller's thread; every operation here runs to completion synchronously.

pub mod error;
pub mod image;
pub mod keywords;
pub mod minify;
pub mod redirect;
pub mod resource;
pub mod url_resolver;

pub use error::{AddRejected, ImageError, MinifyError};
pub use redirect::{ChainId, RedirectChain, RedirectRegistry};
pub use resource::{AcceptAllFilter, Resource, ResourceCollection, ResourceFilter, StaticResource};
pub use url_resolver::{UriResolver, UrlCrateResolver};
