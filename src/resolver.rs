//! Resource resolver
//!
//! Top-level entry point: wraps a [`CatalogManager`] and implements `lookup` (catalog
//! only, spec §6) and `resolve` (lookup then fetch, with the RDDL post-pass and
//! jar/classpath masking from §4.6/§3) over the [`Request`]/[`Response`] data model.

use crate::catalog::manager::CatalogManager;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::fetch::{self, AccessTrack};
use crate::limits::Limits;
use crate::rddl;
use crate::uri;

/// A resolution request (spec §3). At least one of `uri`, `public_id`, `entity_name`
/// must be set for `lookup`/`resolve` to do anything but return `not-found`.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// A system identifier, namespace URI, or plain URI reference, depending on track.
    pub uri: Option<String>,
    /// Base URI to resolve a relative `uri` against.
    pub base_uri: Option<String>,
    /// The entity or doctype root-element name (TR9401 `doctype`/`entity` lookup).
    pub entity_name: Option<String>,
    /// A public identifier (FPI).
    pub public_id: Option<String>,
    /// What kind of resource is wanted; `external-entity`/`dtd` select the entity
    /// track, anything else (including `None`) selects the URI track.
    pub nature: Option<String>,
    /// Why the resource is wanted (RDDL arcrole); paired with `nature` for namespace
    /// queries.
    pub purpose: Option<String>,
    /// Whether `resolve` should follow HTTP redirects when opening the stream.
    pub follow_redirects: bool,
    /// Whether `resolve` should actually open and return the byte stream, or just
    /// report the resolved URI and metadata.
    pub open_stream: bool,
}

impl Request {
    /// A request carrying only a system identifier.
    pub fn for_system_id(system_id: impl Into<String>) -> Self {
        Self {
            uri: Some(system_id.into()),
            nature: Some("dtd".to_string()),
            follow_redirects: true,
            open_stream: true,
            ..Default::default()
        }
    }

    /// A request carrying only a URI (namespace or plain resource reference).
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            follow_redirects: true,
            open_stream: true,
            ..Default::default()
        }
    }

    fn is_entity_track(&self) -> bool {
        matches!(self.nature.as_deref(), Some("external-entity") | Some("dtd"))
    }
}

/// The outcome of a catalog-only lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    NotFound,
    Found { resolved_uri: String },
}

impl LookupResult {
    pub fn resolved_uri(&self) -> Option<&str> {
        match self {
            LookupResult::Found { resolved_uri } => Some(resolved_uri),
            LookupResult::NotFound => None,
        }
    }
}

/// The outcome of `resolve` (spec §3 "Resource response").
#[derive(Debug, Clone)]
pub struct Response {
    pub resolved_uri: Option<String>,
    pub local_uri: Option<String>,
    pub stream: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub status_code: Option<u16>,
    pub headers: Vec<(String, String)>,
}

impl Response {
    fn not_found() -> Self {
        Self {
            resolved_uri: None,
            local_uri: None,
            stream: None,
            content_type: None,
            encoding: None,
            status_code: None,
            headers: Vec::new(),
        }
    }
}

/// Orchestrates catalog lookup and fetch for a configured catalog set.
pub struct Resolver {
    manager: CatalogManager,
    config: ResolverConfig,
    limits: Limits,
}

impl Resolver {
    /// Build a resolver from a configuration, using default limits.
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_limits(config, Limits::default())
    }

    /// Build a resolver with explicit resource limits.
    pub fn with_limits(config: ResolverConfig, limits: Limits) -> Self {
        let manager = CatalogManager::with_limits(config.clone(), limits.clone());
        Self {
            manager,
            config,
            limits,
        }
    }

    /// The underlying catalog manager, for direct `lookup_*` calls or `reload`.
    pub fn manager(&self) -> &CatalogManager {
        &self.manager
    }

    /// Catalog-only lookup; never performs network I/O.
    pub fn lookup(&self, request: &Request) -> Result<LookupResult> {
        let found = self.catalog_lookup(request)?;
        Ok(match found {
            Some(uri) => LookupResult::Found { resolved_uri: uri },
            None => LookupResult::NotFound,
        })
    }

    fn catalog_lookup(&self, request: &Request) -> Result<Option<String>> {
        if request.is_entity_track() {
            return self.manager.lookup_entity_with_fallback(
                request.public_id.as_deref(),
                request.uri.as_deref(),
                request.entity_name.as_deref(),
            );
        }
        if request.uri.is_none() && request.public_id.is_none() {
            if let Some(name) = request.entity_name.as_deref() {
                return self.manager.lookup_doctype(name);
            }
            return Ok(None);
        }
        if let Some(uri) = request.uri.as_deref() {
            return self
                .manager
                .lookup_uri(uri, request.nature.as_deref(), request.purpose.as_deref());
        }
        self.manager
            .lookup_entity(request.public_id.as_deref(), None, request.entity_name.as_deref())
    }

    /// Lookup then fetch (spec §6 `resolve`). Falls back to resolving the request's
    /// absolute URI directly when `always_resolve` is set and the catalog misses.
    pub fn resolve(&self, request: &Request) -> Result<Response> {
        let catalog_hit = self.catalog_lookup(request)?;

        let mut target = match catalog_hit {
            Some(uri) => Some(uri),
            None if self.config.always_resolve => self.absolute_request_uri(request)?,
            None => None,
        };

        let Some(mut resolved) = target.take() else {
            return Ok(Response::not_found());
        };

        if self.config.parse_rddl {
            if let (Some(nature), Some(purpose)) =
                (request.nature.as_deref(), request.purpose.as_deref())
            {
                resolved = self.try_rddl(&resolved, nature, purpose).unwrap_or(resolved);
            }
        }

        let (public_uri, fetch_uri) = self.apply_jar_masking(request, &resolved)?;

        if !request.open_stream {
            return Ok(Response {
                resolved_uri: Some(public_uri),
                local_uri: Some(fetch_uri),
                stream: None,
                content_type: None,
                encoding: None,
                status_code: None,
                headers: Vec::new(),
            });
        }

        let track = if request.is_entity_track() {
            AccessTrack::Entity
        } else {
            AccessTrack::Document
        };
        let response = fetch::fetch_with_redirects(
            &fetch_uri,
            &self.config,
            track,
            &self.limits,
            request.follow_redirects,
        )?;

        Ok(Response {
            resolved_uri: Some(public_uri),
            local_uri: Some(response.final_uri),
            stream: Some(response.bytes),
            content_type: response.content_type,
            encoding: response.encoding,
            status_code: Some(response.status_code),
            headers: response.headers,
        })
    }

    fn absolute_request_uri(&self, request: &Request) -> Result<Option<String>> {
        let Some(raw) = request.uri.as_deref() else {
            return Ok(None);
        };
        let base = request
            .base_uri
            .as_deref()
            .map(uri::parse_absolute)
            .transpose()?;
        Ok(Some(uri::resolve(base.as_ref(), raw)?.to_string()))
    }

    /// RDDL post-pass (spec §4.6): fetch, scan for a matching `rddl:resource`, and
    /// re-run a catalog lookup on its href. Failures are logged and tolerated.
    fn try_rddl(&self, resolved: &str, nature: &str, purpose: &str) -> Option<String> {
        let fetched = match fetch::fetch(resolved, &self.config, AccessTrack::Document, &self.limits) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(uri = %resolved, error = %e, "RDDL fetch failed, using catalog result");
                return None;
            }
        };

        let is_html = matches!(
            fetched.content_type.as_deref(),
            Some("text/html") | Some("application/html+xml")
        );
        if !is_html {
            return None;
        }

        let text = match String::from_utf8(fetched.bytes) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(uri = %resolved, error = %e, "RDDL document was not valid UTF-8");
                return None;
            }
        };
        let base = uri::parse_absolute(resolved).ok()?;
        let href = match rddl::find_resource(&text, &base, nature, purpose) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(uri = %resolved, error = %e, "RDDL scan failed");
                return None;
            }
        }?;

        let href = href.to_string();
        match self.manager.lookup_uri(&href, Some(nature), Some(purpose)) {
            Ok(Some(catalog_hit)) => Some(catalog_hit),
            _ => Some(href),
        }
    }

    /// Apply `mask_jar_uris` (spec §3): the public `resolved_uri` becomes the request's
    /// absolute URI while `local_uri` keeps the real `jar:`/`classpath:` fetch target.
    fn apply_jar_masking(&self, request: &Request, resolved: &str) -> Result<(String, String)> {
        let is_masked_scheme = uri::parse_absolute(resolved)
            .map(|u| matches!(u.scheme(), "jar" | "classpath"))
            .unwrap_or(false);

        if self.config.mask_jar_uris && is_masked_scheme {
            if let Some(public) = self.absolute_request_uri(request)? {
                return Ok((public, resolved.to_string()));
            }
        }
        Ok((resolved.to_string(), resolved.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with_catalog(xml: &'static str) -> (Resolver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.xml");
        std::fs::write(&path, xml).unwrap();
        let uri = url::Url::from_file_path(&path).unwrap().to_string();
        let config = ResolverConfig::new([uri]);
        (Resolver::new(config), dir)
    }

    #[test]
    fn resolves_data_uri_through_catalog() {
        let (resolver, _dir) = resolver_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="http://example.com/example.xml"
       uri="data:application/xml;base64,PGRvYz5JIHdhcyBhIGRhdGEgVVJJPC9kb2M+Cg=="/>
</catalog>"#,
        );
        let request = Request::for_uri("http://example.com/example.xml");
        let response = resolver.resolve(&request).unwrap();
        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.content_type.as_deref(), Some("application/xml"));
        assert_eq!(response.stream.unwrap(), b"<doc>I was a data URI</doc>\n");
    }

    #[test]
    fn not_found_without_always_resolve() {
        let (resolver, _dir) = resolver_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog"/>"#,
        );
        let request = Request::for_uri("http://example.com/unmapped.xml");
        let response = resolver.resolve(&request).unwrap();
        assert!(response.resolved_uri.is_none());
        assert!(response.stream.is_none());
    }

    #[test]
    fn lookup_never_opens_a_stream() {
        let (resolver, _dir) = resolver_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="urn:known" uri="x.dtd"/>
</catalog>"#,
        );
        let request = Request::for_system_id("urn:known");
        let result = resolver.lookup(&request).unwrap();
        assert!(matches!(result, LookupResult::Found { .. }));
    }
}
