//! Resource limits for fetch and catalog traversal
//!
//! Bounds the two things a hostile or malformed catalog graph can blow up: HTTP
//! redirect chains (spec §4.7/§4.8) and `nextCatalog`/`delegate*` traversal depth
//! (spec §4.2/§5).

use crate::error::{Error, Result};

/// Resolver-wide limits configuration.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum number of HTTP redirects to follow for a single fetch (§4.7: 64)
    pub max_redirects: usize,

    /// Maximum number of distinct catalogs a single lookup may chase through
    /// `nextCatalog`/`delegate*` before giving up, independent of the `visited`
    /// cycle guard (a backstop against pathologically large catalog graphs)
    pub max_catalog_chain: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_redirects: 64,
            max_catalog_chain: 4096,
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stricter limits, suitable for resolving catalogs from untrusted sources.
    pub fn strict() -> Self {
        Self {
            max_redirects: 16,
            max_catalog_chain: 256,
        }
    }

    /// Looser limits for large, trusted catalog deployments.
    pub fn permissive() -> Self {
        Self {
            max_redirects: 64,
            max_catalog_chain: 65536,
        }
    }

    /// Check if a redirect hop count is within limits.
    pub fn check_redirects(&self, hops: usize) -> Result<()> {
        if hops > self.max_redirects {
            Err(Error::LimitExceeded(format!(
                "redirect count {} exceeds maximum {}",
                hops, self.max_redirects
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a catalog-chain length is within limits.
    pub fn check_catalog_chain(&self, length: usize) -> Result<()> {
        if length > self.max_catalog_chain {
            Err(Error::LimitExceeded(format!(
                "catalog chain length {} exceeds maximum {}",
                length, self.max_catalog_chain
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_typical_redirect_chains() {
        let limits = Limits::default();
        assert!(limits.check_redirects(10).is_ok());
        assert!(limits.check_redirects(100).is_err());
    }

    #[test]
    fn strict_limits_are_tighter_than_default() {
        let limits = Limits::strict();
        assert!(limits.max_redirects < Limits::default().max_redirects);
        assert!(limits.check_redirects(20).is_err());
    }

    #[test]
    fn permissive_limits_allow_large_catalog_chains() {
        let limits = Limits::permissive();
        assert!(limits.max_catalog_chain > Limits::default().max_catalog_chain);
        assert!(limits.check_catalog_chain(5000).is_ok());
    }

    #[test]
    fn catalog_chain_limit_trips_past_max() {
        let limits = Limits::default();
        assert!(limits.check_catalog_chain(100).is_ok());
        assert!(limits.check_catalog_chain(5000).is_err());
    }
}
