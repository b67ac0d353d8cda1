//! RDDL (Resource Directory Description Language) scanning
//!
//! A linear, SAX-like pass over a fetched namespace document (spec §4.6/§9): walk
//! `rddl:resource` elements, matching `xlink:role`/`xlink:arcrole` against the
//! requested `nature`/`purpose`, tracking an `xml:base` (and HTML `<base>`) stack. No
//! DOM is built. Parse failures are non-fatal to the caller — see `resolver.rs`'s
//! fallback path.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use crate::error::{Error, Result};
use crate::uri;

/// Scan `document` (HTML or XML text) for the first `rddl:resource` whose role/arcrole
/// match `nature`/`purpose`, resolving its `xlink:href` against the running base-URI
/// stack (seeded with `base`).
pub fn find_resource(document: &str, base: &Url, nature: &str, purpose: &str) -> Result<Option<Url>> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut base_stack = vec![base.clone()];
    // Parallel to the open-element stack: whether that element pushed a base.
    let mut pushed_stack: Vec<bool> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(None),
            Ok(Event::Start(e)) => {
                let pushed = maybe_push_base(&e, &mut base_stack)?;
                if let Some(found) = match_resource(&e, &base_stack, nature, purpose)? {
                    return Ok(Some(found));
                }
                pushed_stack.push(pushed);
            }
            Ok(Event::Empty(e)) => {
                let pushed = maybe_push_base(&e, &mut base_stack)?;
                let found = match_resource(&e, &base_stack, nature, purpose)?;
                if pushed {
                    base_stack.pop();
                }
                if let Some(found) = found {
                    return Ok(Some(found));
                }
            }
            Ok(Event::End(_)) => {
                if pushed_stack.pop().unwrap_or(false) {
                    base_stack.pop();
                }
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Rddl {
                    uri: base.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Push a new base URI if this element carries `xml:base` or is an HTML `<base href>`.
/// Returns whether a base was pushed, so the caller can pop it at the matching close.
fn maybe_push_base(e: &BytesStart, base_stack: &mut Vec<Url>) -> Result<bool> {
    let attrs = collect_attrs(e);
    let local_name = local_name_of(e);

    if let Some((_, xml_base)) = attrs.iter().find(|(k, _)| k == "base") {
        base_stack.push(uri::resolve(base_stack.last(), xml_base)?);
        return Ok(true);
    }
    if local_name.eq_ignore_ascii_case("base") {
        if let Some((_, href)) = attrs.iter().find(|(k, _)| k == "href") {
            base_stack.push(uri::resolve(base_stack.last(), href)?);
            return Ok(true);
        }
    }
    Ok(false)
}

/// If this element is an `rddl:resource` matching `nature`/`purpose`, resolve and
/// return its `xlink:href`.
fn match_resource(
    e: &BytesStart,
    base_stack: &[Url],
    nature: &str,
    purpose: &str,
) -> Result<Option<Url>> {
    if local_name_of(e) != "resource" {
        return Ok(None);
    }
    let attrs = collect_attrs(e);
    let role = attrs.iter().find(|(k, _)| k == "role").map(|(_, v)| v.as_str());
    let arcrole = attrs.iter().find(|(k, _)| k == "arcrole").map(|(_, v)| v.as_str());
    let href = attrs.iter().find(|(k, _)| k == "href").map(|(_, v)| v.as_str());

    if role == Some(nature) && arcrole == Some(purpose) {
        if let Some(href) = href {
            return Ok(Some(uri::resolve(base_stack.last(), href)?));
        }
    }
    Ok(None)
}

fn local_name_of(e: &BytesStart) -> String {
    let full = String::from_utf8_lossy(e.name().as_ref()).to_string();
    full.rsplit(':').next().unwrap_or(&full).to_string()
}

fn collect_attrs(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            let local = key.rsplit(':').next().unwrap_or(&key).to_string();
            let value = a
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string());
            (local, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_resource_with_xml_base() {
        let doc = r#"<html xmlns:rddl="http://www.rddl.org/" xmlns:xlink="http://www.w3.org/1999/xlink">
  <head xml:base="http://ns.example/docs/">
    <rddl:resource xlink:role="http://www.w3.org/2001/XMLSchema"
                    xlink:arcrole="http://www.rddl.org/purposes#schema-validation"
                    xlink:href="sample.xsd"/>
  </head>
</html>"#;
        let base = Url::parse("http://ns.example/sample").unwrap();
        let found = find_resource(
            doc,
            &base,
            "http://www.w3.org/2001/XMLSchema",
            "http://www.rddl.org/purposes#schema-validation",
        )
        .unwrap();
        assert_eq!(
            found.map(|u| u.to_string()),
            Some("http://ns.example/docs/sample.xsd".to_string())
        );
    }

    #[test]
    fn no_match_returns_none() {
        let doc = r#"<html xmlns:rddl="http://www.rddl.org/" xmlns:xlink="http://www.w3.org/1999/xlink">
  <rddl:resource xlink:role="other" xlink:arcrole="other" xlink:href="x.xsd"/>
</html>"#;
        let base = Url::parse("http://ns.example/sample").unwrap();
        let found = find_resource(doc, &base, "wanted-nature", "wanted-purpose").unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn first_match_wins_when_multiple_resources_qualify() {
        let doc = r#"<html xmlns:rddl="http://www.rddl.org/" xmlns:xlink="http://www.w3.org/1999/xlink">
  <rddl:resource xlink:role="n" xlink:arcrole="p" xlink:href="first.xsd"/>
  <rddl:resource xlink:role="n" xlink:arcrole="p" xlink:href="second.xsd"/>
</html>"#;
        let base = Url::parse("http://ns.example/sample").unwrap();
        let found = find_resource(doc, &base, "n", "p").unwrap();
        assert_eq!(
            found.map(|u| u.to_string()),
            Some("http://ns.example/first.xsd".to_string())
        );
    }
}
