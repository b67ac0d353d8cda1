//! # xmlcatalog
//!
//! An OASIS XML Catalogs 1.1 resolution engine: redirects public identifiers, system
//! identifiers, and namespace URIs to concrete, loadable resources, with RDDL
//! (Resource Directory Description Language) post-lookup for namespace documents.
//!
//! ## Features
//!
//! - Full XML Catalogs 1.1 entry vocabulary plus the TR9401 extension elements
//! - `nextCatalog` chaining and `delegate*` scoped sub-searches with cycle avoidance
//! - `rewriteSystem`/`rewriteURI`/`*Suffix` longest-match semantics
//! - `data:`, `classpath:`, `jar:`, `file:`, `http(s):` fetch with bounded redirects
//! - RDDL namespace-document scanning for `nature`/`purpose` resource selection
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlcatalog::config::ResolverConfig;
//! use xmlcatalog::resolver::{Request, Resolver};
//!
//! let config = ResolverConfig::new(["catalog.xml"]);
//! let resolver = Resolver::new(config);
//!
//! let request = Request::for_system_id("-//OASIS//DTD DocBook XML V4.5//EN");
//! let response = resolver.resolve(&request)?;
//! ```
//!
//! Feature/property configuration loading, on-disk resource caching, command-line
//! tools, and SAX/DOM/StAX adapter classes are left to external collaborators; this
//! crate exposes the `lookup(request) -> LookupResult` and `resolve(request) ->
//! Response` contracts they consume.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod limits;
pub mod rddl;
pub mod resolver;
pub mod uri;

// Re-exports for convenience
pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use resolver::{LookupResult, Request, Resolver, Response};
pub use uri::CATALOG_NS;

/// Version of the xmlcatalog library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
