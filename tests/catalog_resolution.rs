//! End-to-end catalog resolution scenarios, exercised through `Resolver` and
//! `CatalogManager` rather than the internal `catalog::query` unit tests.

use std::fs;

use xmlcatalog::config::ResolverConfig;
use xmlcatalog::resolver::{LookupResult, Request, Resolver};

fn write_catalog(dir: &tempfile::TempDir, name: &str, xml: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, xml).unwrap();
    url::Url::from_file_path(&path).unwrap().to_string()
}

#[test]
fn data_uri_resolves_through_a_uri_entry() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        &dir,
        "catalog.xml",
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="http://example.com/example.xml"
       uri="data:application/xml;base64,PGRvYz5oZWxsbzwvZG9jPg=="/>
</catalog>"#,
    );
    let resolver = Resolver::new(ResolverConfig::new([catalog]));

    let response = resolver
        .resolve(&Request::for_uri("http://example.com/example.xml"))
        .unwrap();

    assert_eq!(response.status_code, Some(200));
    assert_eq!(response.stream.unwrap(), b"<doc>hello</doc>");
}

#[test]
fn system_entry_exact_match_wins_over_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        &dir,
        "catalog.xml",
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <rewriteSystem systemIdStartString="-//OASIS//DTD" rewritePrefix="file:///rewritten/"/>
  <system systemId="-//OASIS//DTD DocBook XML V4.5//EN" uri="docbook/v4.5.dtd"/>
</catalog>"#,
    );
    let resolver = Resolver::new(ResolverConfig::new([catalog]));

    let result = resolver
        .lookup(&Request::for_system_id("-//OASIS//DTD DocBook XML V4.5//EN"))
        .unwrap();

    let resolved = result.resolved_uri().unwrap().to_string();
    assert!(resolved.ends_with("docbook/v4.5.dtd"));
    assert!(!resolved.starts_with("file:///rewritten/"));
}

#[test]
fn rewrite_uri_prefix_match_rewrites_remainder() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        &dir,
        "catalog.xml",
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <rewriteURI uriStartString="http://example.com/schemas/" rewritePrefix="classpath:/schemas/"/>
</catalog>"#,
    );
    let manager = Resolver::new(ResolverConfig::new([catalog]));

    let result = manager
        .lookup(&Request::for_uri("http://example.com/schemas/invoice.xsd"))
        .unwrap();

    assert_eq!(
        result,
        LookupResult::Found {
            resolved_uri: "classpath:schemas/invoice.xsd".to_string()
        }
    );
}

#[test]
fn next_catalog_chain_terminates_on_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // a.xml's nextCatalog points at b.xml, which points back at a.xml; the shared
    // `visited` set must stop the recursion instead of looping forever.
    let a_path = dir.path().join("a.xml");
    let b_path = dir.path().join("b.xml");
    let b_uri = url::Url::from_file_path(&b_path).unwrap().to_string();
    let a_uri = url::Url::from_file_path(&a_path).unwrap().to_string();

    fs::write(
        &a_path,
        format!(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <nextCatalog catalog="{b_uri}"/>
</catalog>"#
        ),
    )
    .unwrap();
    fs::write(
        &b_path,
        format!(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <nextCatalog catalog="{a_uri}"/>
</catalog>"#
        ),
    )
    .unwrap();

    let resolver = Resolver::new(ResolverConfig::new([a_uri]));
    let result = resolver
        .lookup(&Request::for_system_id("urn:not-present-anywhere"))
        .unwrap();

    assert_eq!(result, LookupResult::NotFound);
}

#[test]
fn delegate_uri_isolates_the_delegated_scope() {
    let dir = tempfile::tempdir().unwrap();
    let delegate_path = dir.path().join("delegate.xml");
    fs::write(
        &delegate_path,
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="http://example.com/vocab/terms.xsd" uri="terms-from-delegate.xsd"/>
</catalog>"#,
    )
    .unwrap();
    let delegate_uri = url::Url::from_file_path(&delegate_path).unwrap().to_string();

    let root = write_catalog(
        &dir,
        "root.xml",
        &format!(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <delegateURI uriStartString="http://example.com/vocab/" catalog="{delegate_uri}"/>
  <uri name="http://example.com/other.xsd" uri="should-not-be-reached.xsd"/>
</catalog>"#
        ),
    );

    let resolver = Resolver::new(ResolverConfig::new([root]));

    let hit = resolver
        .lookup(&Request::for_uri("http://example.com/vocab/terms.xsd"))
        .unwrap();
    assert!(hit.resolved_uri().unwrap().ends_with("terms-from-delegate.xsd"));

    // A URI outside the delegated prefix must not see entries from the delegate,
    // and the delegate's own entries must not leak back into the root scope for
    // names the delegate didn't declare.
    let miss = resolver
        .lookup(&Request::for_uri("http://example.com/vocab/unmapped.xsd"))
        .unwrap();
    assert_eq!(miss, LookupResult::NotFound);
}

#[test]
fn rddl_namespace_lookup_falls_back_to_plain_uri_entry_without_network() {
    // Exercises the RDDL post-pass's failure path: with `parse_rddl` enabled but no
    // content-type information available (a `uri` entry resolving straight to a
    // `data:` URI carrying XML, not HTML), the post-pass is a no-op and the catalog's
    // own `uri` entry resolution is what the caller observes.
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        &dir,
        "catalog.xml",
        r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="http://example.com/ns/vocab"
       uri="data:application/xml;base64,PHZvY2FiLz4="/>
</catalog>"#,
    );
    let config = ResolverConfig::new([catalog]).with_parse_rddl(true);
    let resolver = Resolver::new(config);

    let mut request = Request::for_uri("http://example.com/ns/vocab");
    request.nature = Some("http://www.w3.org/2001/XMLSchema".to_string());
    request.purpose = Some("http://www.rddl.org/purposes#schema-validation".to_string());

    let response = resolver.resolve(&request).unwrap();
    assert_eq!(response.stream.unwrap(), b"<vocab/>");
}
