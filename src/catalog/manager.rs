//! Catalog manager
//!
//! Owns the ordered root catalog list (`primary ++ additions`), the lazy load cache,
//! and the `nextCatalog`/`delegate*` traversal described in spec §4.2-§4.5. This is the
//! only component that loads catalogs or touches the per-lookup `visited` set; the
//! matching logic itself lives in `catalog::query` as pure functions over an already
//! loaded catalog.

use std::collections::HashSet;
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::catalog::loader::{resolve_prefer_scopes, CatalogLoader};
use crate::catalog::query;
use crate::config::ResolverConfig;
use crate::entry::LoadedCatalog;
use crate::error::Result;
use crate::limits::Limits;

#[derive(Debug, Clone)]
enum CacheSlot {
    Loaded(LoadedCatalog),
    /// A prior load attempt failed; cached so repeated lookups within one session don't
    /// retry the same broken source (§9 design note).
    Failed,
}

/// Holds the root catalog list, the per-URI load cache, and orchestrates lookups.
///
/// Thread-safe for concurrent reads: the cache is a `RwLock<IndexMap<..>>`; concurrent
/// readers racing to load the same unloaded catalog both parse it, but only one
/// insertion survives (the loser's result is discarded, per spec §5).
pub struct CatalogManager {
    config: ResolverConfig,
    limits: Limits,
    loader: CatalogLoader,
    cache: RwLock<IndexMap<String, CacheSlot>>,
}

impl CatalogManager {
    /// Build a manager from a resolver configuration, using default limits.
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_limits(config, Limits::default())
    }

    /// Build a manager with explicit resource limits (e.g. [`Limits::strict`]).
    pub fn with_limits(config: ResolverConfig, limits: Limits) -> Self {
        let loader = if config.strict_loader {
            CatalogLoader::strict()
        } else {
            CatalogLoader::new()
        };
        Self {
            config,
            limits,
            loader,
            cache: RwLock::new(IndexMap::new()),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Invalidate every cached catalog. An in-flight lookup observes either the old map
    /// or the new one in full, never a mixture, because the swap happens under a single
    /// write-lock acquisition.
    pub fn reload(&self) {
        let mut cache = self.cache.write().unwrap();
        *cache = IndexMap::new();
    }

    fn root_catalogs(&self) -> impl Iterator<Item = &String> {
        self.config
            .catalog_files
            .iter()
            .chain(self.config.catalog_additions.iter())
    }

    /// Load (or fetch from cache) the catalog at `uri`. Returns `None` for a source that
    /// failed to load or parse; the failure itself is logged, never propagated, since a
    /// broken catalog in a chain must not abort the whole lookup.
    fn load(&self, uri: &str) -> Option<LoadedCatalog> {
        if let Some(slot) = self.cache.read().unwrap().get(uri) {
            return match slot {
                CacheSlot::Loaded(catalog) => Some(catalog.clone()),
                CacheSlot::Failed => None,
            };
        }

        let loaded = self.fetch_and_parse(uri);
        let slot = match &loaded {
            Some(catalog) => CacheSlot::Loaded(catalog.clone()),
            None => CacheSlot::Failed,
        };
        // A racing loader may have already populated this entry; last writer wins,
        // and the loser's parse work is simply discarded (spec §5).
        self.cache.write().unwrap().insert(uri.to_string(), slot);
        loaded
    }

    fn fetch_and_parse(&self, uri: &str) -> Option<LoadedCatalog> {
        let bytes = match crate::fetch::read_to_string(uri, &self.config) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(catalog = %uri, error = %e, "failed to load catalog source");
                return None;
            }
        };
        match self.loader.load_str(&bytes, uri) {
            Ok(mut catalog) => {
                resolve_prefer_scopes(&mut catalog);
                Some(catalog)
            }
            Err(e) => {
                tracing::warn!(catalog = %uri, error = %e, "failed to parse catalog");
                None
            }
        }
    }

    /// External identifier lookup (spec §4.3): system-first, then public, then doctype.
    pub fn lookup_entity(
        &self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<String>> {
        for root in self.root_catalogs().cloned().collect::<Vec<_>>() {
            let mut visited = HashSet::new();
            let mut chain_len = 0usize;
            if let Some(found) = self.chase_entity(
                &root,
                public_id,
                system_id,
                name,
                &mut visited,
                &mut chain_len,
            )? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn chase_entity(
        &self,
        catalog_uri: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        name: Option<&str>,
        visited: &mut HashSet<String>,
        chain_len: &mut usize,
    ) -> Result<Option<String>> {
        if visited.contains(catalog_uri) {
            return Ok(None);
        }
        visited.insert(catalog_uri.to_string());
        *chain_len += 1;
        self.limits.check_catalog_chain(*chain_len)?;

        let catalog = match self.load(catalog_uri) {
            Some(c) => c,
            None => return Ok(None),
        };

        if let Some(system_id) = system_id {
            if let Some(uri) = query::match_system_exact(&catalog, system_id) {
                return Ok(Some(uri));
            }
            if let Some(uri) = query::match_system_suffix(&catalog, system_id) {
                return Ok(Some(uri));
            }
            if let Some(uri) = query::match_rewrite_system(&catalog, system_id) {
                return Ok(Some(uri));
            }
            for delegate in query::delegate_system_candidates(&catalog, system_id) {
                if let Some(found) =
                    self.chase_entity(&delegate, None, None, None, visited, chain_len)?
                {
                    return Ok(Some(found));
                }
            }
        }

        if let Some(public_id) = public_id {
            if let Some(uri) = query::match_public_exact(&catalog, public_id, system_id.is_some())
            {
                return Ok(Some(uri));
            }
            for delegate in query::delegate_public_candidates(&catalog, public_id) {
                if let Some(found) =
                    self.chase_entity(&delegate, Some(public_id), None, None, visited, chain_len)?
                {
                    return Ok(Some(found));
                }
            }
        }

        if let Some(name) = name {
            if let Some(uri) = query::match_doctype(&catalog, name) {
                return Ok(Some(uri));
            }
        }

        for next in query::next_catalogs(&catalog) {
            if let Some(found) =
                self.chase_entity(&next, public_id, system_id, name, visited, chain_len)?
            {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// URI-track lookup (spec §4.4), also used by namespace lookup (§4.6) since a
    /// namespace query is a URI query carrying `nature`/`purpose`.
    pub fn lookup_uri(
        &self,
        uri_name: &str,
        nature: Option<&str>,
        purpose: Option<&str>,
    ) -> Result<Option<String>> {
        for root in self.root_catalogs().cloned().collect::<Vec<_>>() {
            let mut visited = HashSet::new();
            let mut chain_len = 0usize;
            if let Some(found) =
                self.chase_uri(&root, uri_name, nature, purpose, &mut visited, &mut chain_len)?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn chase_uri(
        &self,
        catalog_uri: &str,
        uri_name: &str,
        nature: Option<&str>,
        purpose: Option<&str>,
        visited: &mut HashSet<String>,
        chain_len: &mut usize,
    ) -> Result<Option<String>> {
        if visited.contains(catalog_uri) {
            return Ok(None);
        }
        visited.insert(catalog_uri.to_string());
        *chain_len += 1;
        self.limits.check_catalog_chain(*chain_len)?;

        let catalog = match self.load(catalog_uri) {
            Some(c) => c,
            None => return Ok(None),
        };

        if let Some(uri) =
            query::match_uri_exact(&catalog, uri_name, nature, purpose, self.config.merge_https)
        {
            return Ok(Some(uri));
        }
        if let Some(uri) = query::match_uri_suffix(&catalog, uri_name) {
            return Ok(Some(uri));
        }
        if let Some(uri) = query::match_rewrite_uri(&catalog, uri_name) {
            return Ok(Some(uri));
        }
        for delegate in query::delegate_uri_candidates(&catalog, uri_name) {
            if let Some(found) =
                self.chase_uri(&delegate, uri_name, nature, purpose, visited, chain_len)?
            {
                return Ok(Some(found));
            }
        }
        for next in query::next_catalogs(&catalog) {
            if let Some(found) =
                self.chase_uri(&next, uri_name, nature, purpose, visited, chain_len)?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Doctype-name-only lookup (spec §4.5).
    pub fn lookup_doctype(&self, name: &str) -> Result<Option<String>> {
        self.lookup_entity(None, None, Some(name))
    }

    /// On a system-identifier miss, `uri_for_system` retries the same string on the URI
    /// track (spec §6 option table).
    pub fn lookup_entity_with_fallback(
        &self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(found) = self.lookup_entity(public_id, system_id, name)? {
            return Ok(Some(found));
        }
        if self.config.uri_for_system {
            if let Some(system_id) = system_id {
                return self.lookup_uri(system_id, None, None);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_catalog(xml: &'static str) -> (CatalogManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.xml");
        std::fs::write(&path, xml).unwrap();
        let uri = url::Url::from_file_path(&path).unwrap().to_string();
        let config = ResolverConfig::new([uri]);
        (CatalogManager::new(config), dir)
    }

    #[test]
    fn system_exact_resolves() {
        let (manager, _dir) = manager_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="-//OASIS//DTD DocBook XML V4.5//EN" uri="docbook.dtd"/>
</catalog>"#,
        );
        let result = manager
            .lookup_entity(None, Some("-//OASIS//DTD DocBook XML V4.5//EN"), None)
            .unwrap();
        assert!(result.unwrap().ends_with("docbook.dtd"));
    }

    #[test]
    fn unknown_system_id_is_not_found_not_error() {
        let (manager, _dir) = manager_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="urn:known" uri="x.dtd"/>
</catalog>"#,
        );
        let result = manager.lookup_entity(None, Some("urn:unknown"), None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn reload_clears_cache() {
        let (manager, _dir) = manager_with_catalog(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="urn:known" uri="x.dtd"/>
</catalog>"#,
        );
        manager.lookup_entity(None, Some("urn:known"), None).unwrap();
        assert_eq!(manager.cache.read().unwrap().len(), 1);
        manager.reload();
        assert_eq!(manager.cache.read().unwrap().len(), 0);
    }
}
