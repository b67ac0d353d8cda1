//! Resolver configuration
//!
//! An explicit, immutable configuration object passed into the catalog manager and
//! resolver. No process-wide singleton: callers build one `ResolverConfig` and share
//! it behind an `Arc` across threads.
//!
//! Loading these values from environment variables or a `.properties` file is not this
//! module's job (see the crate's top-level docs) - each field's doc comment names the
//! equivalent key for readers porting a configuration from another XML Catalogs
//! implementation.

use std::path::PathBuf;

/// Which scheme is preferred when both an environment variable and a property file
/// would otherwise set the same option. This crate does not read either source itself;
/// the field exists so an external adapter can record the precedence it applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferPropertyFile {
    /// Environment variables win over property-file values
    #[default]
    EnvironmentWins,
    /// Property-file values win over environment variables
    PropertyFileWins,
}

/// Immutable resolver configuration.
///
/// Construct with [`ResolverConfig::new`] and customize with the `with_*` builder
/// methods, mirroring the builder shape already used by [`crate::limits::Limits`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Ordered list of primary catalog URIs.
    /// Equivalent key: `xml.catalog.files` / `CatalogManager.catalogFiles`.
    pub catalog_files: Vec<String>,

    /// Catalog URIs appended after `catalog_files`, consulted in the same pass.
    /// Equivalent key: `xml.catalog.additions`.
    pub catalog_additions: Vec<String>,

    /// Precedence between environment and property-file configuration sources.
    /// Equivalent key: `xml.catalog.preferPropertyFile`.
    pub prefer_property_file: PreferPropertyFile,

    /// On a catalog miss, resolve the request's absolute URI directly instead of
    /// reporting `not-found`. Equivalent key: `xml.catalog.resolve` (value `all`/`no`).
    pub always_resolve: bool,

    /// Enable the RDDL post-pass for namespace queries that carry both `nature` and
    /// `purpose`. Equivalent key: `xml.catalog.parseRddl`.
    pub parse_rddl: bool,

    /// On a system-identifier miss, retry the same string as a URI-track lookup.
    /// Equivalent key: `xml.catalog.uriForSystem`.
    pub uri_for_system: bool,

    /// Treat `http://` and `https://` as the same scheme for comparison and for the
    /// entity/document access lists. Equivalent key: `xml.catalog.mergeHttps`.
    pub merge_https: bool,

    /// Hide `jar:`/`classpath:` URIs from the response's `resolved_uri`, reporting the
    /// original request URI there while `local_uri` carries the real fetch URI.
    /// Equivalent key: `xml.catalog.maskJarUris`.
    pub mask_jar_uris: bool,

    /// Allow-listed schemes for the entity resolution track (`external-entity`/`dtd`).
    /// Equivalent key: `xml.catalog.accessExternalEntity`.
    pub access_external_entity: Vec<String>,

    /// Allow-listed schemes for the URI resolution track (everything else).
    /// Equivalent key: `xml.catalog.accessExternalDocument`.
    pub access_external_document: Vec<String>,

    /// Rewrite backslash-separated Windows paths and drive letters into `file:` URIs
    /// before resolution. Equivalent key: `xml.catalog.fixWindowsSystemIdentifiers`.
    pub fix_windows_system_identifiers: bool,

    /// Surface URI construction/I/O errors to the caller instead of silently folding
    /// them into `not-found`. Equivalent key: `xml.catalog.throwUriExceptions`.
    pub throw_uri_exceptions: bool,

    /// Use the strict/validating catalog loader instead of the tolerant one.
    /// Equivalent key: `xml.catalog.className` (a validating loader class, here a flag).
    pub strict_loader: bool,

    /// Root directory used to resolve `classpath:` URIs (this crate's stand-in for a
    /// JVM classloader's resource roots). `None` disables `classpath:` resolution.
    /// Equivalent key: `xml.catalog.classpath` / a configured resource-loader root.
    pub classpath_root: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            catalog_files: Vec::new(),
            catalog_additions: Vec::new(),
            prefer_property_file: PreferPropertyFile::default(),
            always_resolve: false,
            parse_rddl: false,
            uri_for_system: false,
            merge_https: false,
            mask_jar_uris: true,
            access_external_entity: vec!["file".into(), "jar".into(), "classpath".into()],
            access_external_document: vec![
                "file".into(),
                "jar".into(),
                "classpath".into(),
                "http".into(),
                "https".into(),
                "data".into(),
            ],
            fix_windows_system_identifiers: cfg!(windows),
            throw_uri_exceptions: false,
            strict_loader: false,
            classpath_root: None,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration with the given primary catalog files and otherwise
    /// default settings.
    pub fn new(catalog_files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            catalog_files: catalog_files.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Append catalogs consulted after the primary list.
    pub fn with_additions(mut self, additions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.catalog_additions = additions.into_iter().map(Into::into).collect();
        self
    }

    /// Set `always_resolve`.
    pub fn with_always_resolve(mut self, value: bool) -> Self {
        self.always_resolve = value;
        self
    }

    /// Set `parse_rddl`.
    pub fn with_parse_rddl(mut self, value: bool) -> Self {
        self.parse_rddl = value;
        self
    }

    /// Set `uri_for_system`.
    pub fn with_uri_for_system(mut self, value: bool) -> Self {
        self.uri_for_system = value;
        self
    }

    /// Set `merge_https`.
    pub fn with_merge_https(mut self, value: bool) -> Self {
        self.merge_https = value;
        self
    }

    /// Set `mask_jar_uris`.
    pub fn with_mask_jar_uris(mut self, value: bool) -> Self {
        self.mask_jar_uris = value;
        self
    }

    /// Set the entity-track scheme allow-list.
    pub fn with_access_external_entity(
        mut self,
        schemes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.access_external_entity = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the URI-track scheme allow-list.
    pub fn with_access_external_document(
        mut self,
        schemes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.access_external_document = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// Set `fix_windows_system_identifiers`.
    pub fn with_fix_windows_system_identifiers(mut self, value: bool) -> Self {
        self.fix_windows_system_identifiers = value;
        self
    }

    /// Set `throw_uri_exceptions`.
    pub fn with_throw_uri_exceptions(mut self, value: bool) -> Self {
        self.throw_uri_exceptions = value;
        self
    }

    /// Select the strict/validating catalog loader.
    pub fn with_strict_loader(mut self, value: bool) -> Self {
        self.strict_loader = value;
        self
    }

    /// Set the `classpath:` resource root.
    pub fn with_classpath_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.classpath_root = Some(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_access_lists() {
        let cfg = ResolverConfig::default();
        assert!(cfg.access_external_document.contains(&"http".to_string()));
        assert!(cfg.access_external_entity.contains(&"file".to_string()));
        assert!(cfg.mask_jar_uris);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ResolverConfig::new(["cat.xml"])
            .with_additions(["extra.xml"])
            .with_always_resolve(true)
            .with_parse_rddl(true)
            .with_merge_https(true);

        assert_eq!(cfg.catalog_files, vec!["cat.xml".to_string()]);
        assert_eq!(cfg.catalog_additions, vec!["extra.xml".to_string()]);
        assert!(cfg.always_resolve);
        assert!(cfg.parse_rddl);
        assert!(cfg.merge_https);
    }
}
