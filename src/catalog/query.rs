//! Query engine
//!
//! Pure, catalog-local matching functions implementing the four lookup tracks from
//! spec §4.3-§4.5 (external identifier, URI, doctype, namespace-as-URI). These
//! functions never load a catalog themselves — delegate/`nextCatalog` targets are
//! returned as candidate URI lists for `catalog::manager::CatalogManager` to chase,
//! which is the only component allowed to touch the cache or the `visited` set.
//!
//! Matching is a fold over variant-specific predicates grouped by kind (per the design
//! note in §9), not a virtual dispatch over `Entry`.

use crate::entry::{Entry, LoadedCatalog, Prefer};
use crate::uri::{self, longest_prefix_match, longest_suffix_match};

/// Exact `system` match (spec §4.3 step 1).
pub fn match_system_exact(catalog: &LoadedCatalog, system_id: &str) -> Option<String> {
    catalog.iter_local().find_map(|e| match e {
        Entry::System {
            system_id: sid,
            uri,
            ..
        } if sid == system_id => Some(uri.clone()),
        _ => None,
    })
}

/// Longest `systemSuffix` match (step 2).
pub fn match_system_suffix(catalog: &LoadedCatalog, system_id: &str) -> Option<String> {
    let candidates = catalog.iter_local().filter_map(|e| match e {
        Entry::SystemSuffix {
            system_id_suffix,
            uri,
            ..
        } => Some((system_id_suffix.as_str(), uri.clone())),
        _ => None,
    });
    longest_suffix_match(system_id, candidates)
}

/// Longest `rewriteSystem` prefix match (step 3); returns `rewrite_prefix ++ remainder`.
pub fn match_rewrite_system(catalog: &LoadedCatalog, system_id: &str) -> Option<String> {
    let candidates = catalog.iter_local().filter_map(|e| match e {
        Entry::RewriteSystem {
            system_id_start,
            rewrite_prefix,
            ..
        } => Some((system_id_start.as_str(), rewrite_prefix.clone())),
        _ => None,
    });
    let (start, prefix) = longest_prefix_match(system_id, candidates)?;
    Some(apply_rewrite(&prefix, start, system_id))
}

/// `delegateSystem` candidates (step 4), longest `system_id_start` prefix first.
pub fn delegate_system_candidates(catalog: &LoadedCatalog, system_id: &str) -> Vec<String> {
    let mut matches: Vec<(usize, String)> = catalog
        .iter_local()
        .filter_map(|e| match e {
            Entry::DelegateSystem {
                system_id_start,
                catalog_uri,
                ..
            } if system_id.starts_with(system_id_start.as_str()) => {
                Some((system_id_start.len(), catalog_uri.clone()))
            }
            _ => None,
        })
        .collect();
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    matches.into_iter().map(|(_, uri)| uri).collect()
}

/// Exact `public` match (step 5), honoring the nearest enclosing scope's `prefer`. A
/// `public` entry only applies when `prefer` resolves to `Public`, or when no `system`
/// identifier was given at all (in which case `public` is the only track available).
pub fn match_public_exact(
    catalog: &LoadedCatalog,
    public_id: &str,
    system_id_given: bool,
) -> Option<String> {
    catalog.iter_local().find_map(|e| match e {
        Entry::Public {
            public_id: pid,
            uri,
            resolved_prefer,
            ..
        } if pid == public_id && (!system_id_given || *resolved_prefer == Prefer::Public) => {
            Some(uri.clone())
        }
        _ => None,
    })
}

/// `delegatePublic` candidates (step 5 continuation), longest prefix first.
pub fn delegate_public_candidates(catalog: &LoadedCatalog, public_id: &str) -> Vec<String> {
    let mut matches: Vec<(usize, String)> = catalog
        .iter_local()
        .filter_map(|e| match e {
            Entry::DelegatePublic {
                public_id_start,
                catalog_uri,
                ..
            } if public_id.starts_with(public_id_start.as_str()) => {
                Some((public_id_start.len(), catalog_uri.clone()))
            }
            _ => None,
        })
        .collect();
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    matches.into_iter().map(|(_, uri)| uri).collect()
}

/// Exact TR9401 `doctype` match (step 6, §4.5).
pub fn match_doctype(catalog: &LoadedCatalog, name: &str) -> Option<String> {
    catalog.iter_local().find_map(|e| match e {
        Entry::Doctype { name: n, uri, .. } if n == name => Some(uri.clone()),
        _ => None,
    })
}

/// Exact `uri` match (§4.4 step 1). `nature`/`purpose` on the entry constrain the match
/// only when present on the entry (decision (b) in DESIGN.md); a request that carries
/// neither still matches an entry that specifies them.
pub fn match_uri_exact(
    catalog: &LoadedCatalog,
    name: &str,
    nature: Option<&str>,
    purpose: Option<&str>,
    merge_https: bool,
) -> Option<String> {
    let target = uri::normalize_for_comparison(name, merge_https);
    catalog.iter_local().find_map(|e| match e {
        Entry::Uri {
            name: n,
            uri,
            nature: entry_nature,
            purpose: entry_purpose,
            ..
        } if uri::normalize_for_comparison(n, merge_https) == target => {
            let nature_ok = match entry_nature {
                Some(en) => Some(en.as_str()) == nature,
                None => true,
            };
            let purpose_ok = match entry_purpose {
                Some(ep) => Some(ep.as_str()) == purpose,
                None => true,
            };
            if nature_ok && purpose_ok {
                Some(uri.clone())
            } else {
                None
            }
        }
        _ => None,
    })
}

/// Longest `uriSuffix` match (§4.4 step 2).
pub fn match_uri_suffix(catalog: &LoadedCatalog, name: &str) -> Option<String> {
    let candidates = catalog.iter_local().filter_map(|e| match e {
        Entry::UriSuffix { uri_suffix, uri, .. } => Some((uri_suffix.as_str(), uri.clone())),
        _ => None,
    });
    longest_suffix_match(name, candidates)
}

/// Longest `rewriteURI` prefix match (§4.4 step 3).
pub fn match_rewrite_uri(catalog: &LoadedCatalog, name: &str) -> Option<String> {
    let candidates = catalog.iter_local().filter_map(|e| match e {
        Entry::RewriteUri {
            uri_start,
            rewrite_prefix,
            ..
        } => Some((uri_start.as_str(), rewrite_prefix.clone())),
        _ => None,
    });
    let (start, prefix) = longest_prefix_match(name, candidates)?;
    Some(apply_rewrite(&prefix, start, name))
}

/// `delegateURI` candidates (§4.4 step 4), longest prefix first.
pub fn delegate_uri_candidates(catalog: &LoadedCatalog, name: &str) -> Vec<String> {
    let mut matches: Vec<(usize, String)> = catalog
        .iter_local()
        .filter_map(|e| match e {
            Entry::DelegateUri {
                uri_start,
                catalog_uri,
                ..
            } if name.starts_with(uri_start.as_str()) => {
                Some((uri_start.len(), catalog_uri.clone()))
            }
            _ => None,
        })
        .collect();
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    matches.into_iter().map(|(_, uri)| uri).collect()
}

/// `nextCatalog` targets, in document order (§4.3 step 7 / §4.4 step 5).
pub fn next_catalogs(catalog: &LoadedCatalog) -> Vec<String> {
    catalog
        .iter_local()
        .filter_map(|e| match e {
            Entry::NextCatalog { catalog_uri, .. } => Some(catalog_uri.clone()),
            _ => None,
        })
        .collect()
}

fn apply_rewrite(prefix: &str, start: &str, candidate: &str) -> String {
    let remainder = &candidate[start.len().min(candidate.len())..];
    format!("{}{}", prefix, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::loader::{resolve_prefer_scopes, CatalogLoader};

    fn load(xml: &str) -> LoadedCatalog {
        let mut cat = CatalogLoader::new().load_str(xml, "file:///cat/catalog.xml").unwrap();
        resolve_prefer_scopes(&mut cat);
        cat
    }

    #[test]
    fn system_exact_wins_over_public() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="-//X//Y//EN" uri="sys.dtd"/>
  <public publicId="-//X//Y//EN" uri="pub.dtd"/>
</catalog>"#,
        );
        assert_eq!(
            match_system_exact(&cat, "-//X//Y//EN"),
            Some("file:///cat/sys.dtd".to_string())
        );
    }

    #[test]
    fn rewrite_uri_prefix_is_longest_match() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <rewriteURI uriStartString="https://w3.org/" rewritePrefix="file:///mirror/w3/"/>
</catalog>"#,
        );
        let result = match_rewrite_uri(&cat, "https://w3.org/XML/1998/namespace");
        assert_eq!(result, Some("file:///mirror/w3/XML/1998/namespace".to_string()));
    }

    #[test]
    fn rewrite_uri_uses_the_start_string_of_the_winning_prefix_not_a_shared_value() {
        // Two entries share the same rewritePrefix but have different uriStartString
        // lengths; the remainder must be computed against the longest uriStartString
        // that actually matched, not whichever entry happens to be found first when
        // re-deriving the start from the winning prefix value.
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <rewriteURI uriStartString="http://a/" rewritePrefix="file:///m/"/>
  <rewriteURI uriStartString="http://a/b/" rewritePrefix="file:///m/"/>
</catalog>"#,
        );
        let result = match_rewrite_uri(&cat, "http://a/b/c");
        assert_eq!(result, Some("file:///m/c".to_string()));
    }

    #[test]
    fn delegate_uri_isolates_scope() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <delegateURI uriStartString="http://ex/" catalog="d.xml"/>
</catalog>"#,
        );
        let candidates = delegate_uri_candidates(&cat, "http://ex/foo");
        assert_eq!(candidates, vec!["file:///cat/d.xml".to_string()]);
        assert!(delegate_uri_candidates(&cat, "http://other/foo").is_empty());
    }

    #[test]
    fn uri_entry_nature_purpose_constrain_only_when_present() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="http://ns.example/sample" uri="doc.html" nature="n1" purpose="p1"/>
  <uri name="http://ns.example/plain" uri="plain.xml"/>
</catalog>"#,
        );
        assert_eq!(
            match_uri_exact(&cat, "http://ns.example/sample", Some("n1"), Some("p1"), false),
            Some("file:///cat/doc.html".to_string())
        );
        assert_eq!(
            match_uri_exact(&cat, "http://ns.example/sample", None, None, false),
            None
        );
        assert_eq!(
            match_uri_exact(&cat, "http://ns.example/plain", Some("anything"), None, false),
            Some("file:///cat/plain.xml".to_string())
        );
    }
}
