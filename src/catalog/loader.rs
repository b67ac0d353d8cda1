//! Event-driven catalog loader
//!
//! Produces an [`Entry`] tree from a catalog source per spec §4.1. Two entry points
//! exist for the two accepted source kinds: [`CatalogLoader::load_str`] (parses raw
//! XML text with `quick-xml`) and [`CatalogLoader::load_events`] (a caller-driven event
//! producer, e.g. re-using events a host XML parser already emitted). Both funnel
//! through [`CatalogLoader::process_events`], the shared state machine that tracks the
//! `xml:base` and `prefer` stacks, so neither source kind gets divergent behavior.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use crate::entry::{Entry, EntryCommon, LoadedCatalog, Prefer};
use crate::error::{Error, Result};
use crate::uri::{self, CATALOG_NS, TR9401_NS};

/// A single parsed XML event, decoupled from any concrete parser so a caller-driven
/// producer (spec §4.1(b)) can feed the same state machine a file-backed `quick-xml`
/// reader does.
#[derive(Debug, Clone)]
pub enum CatalogXmlEvent {
    /// A start tag (or an empty-element tag, reported as start immediately followed
    /// by `End`) with its resolved local name and attribute list.
    Start {
        /// The element's local name (namespace prefix stripped).
        local_name: String,
        /// Whether this element is in the catalog or TR9401 namespace; elements in
        /// any other namespace are ignored without failing the load.
        in_catalog_ns: bool,
        /// Raw attribute `(local_name, value)` pairs, including `xml:base` if present.
        attributes: Vec<(String, String)>,
    },
    /// The matching end tag for the most recently opened `Start`.
    End,
}

/// Parses catalog sources into an [`Entry`] tree. Stateless: every loaded tree is
/// immutable once returned, so a single `CatalogLoader` value may be shared and reused
/// across threads (it holds no cache itself — that's `catalog::manager::CatalogManager`'s
/// job).
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogLoader {
    /// If true, any schema violation (missing required attribute, malformed URI, an
    /// element that isn't a direct catalog-vocabulary match) aborts the whole load with
    /// [`Error::CatalogParse`] instead of silently dropping the offending entry.
    pub strict: bool,
}

impl CatalogLoader {
    /// Create a tolerant loader (the default).
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Create a strict/validating loader.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Parse catalog XML text already in hand, with `source_uri` used both as the
    /// initial base URI and as the identity this catalog is cached under.
    pub fn load_str(&self, xml: &str, source_uri: &str) -> Result<LoadedCatalog> {
        let events = quick_xml_events(xml, source_uri)?;
        self.load_events(events, source_uri)
    }

    /// Parse a caller-driven stream of [`CatalogXmlEvent`]s (spec §4.1(b)).
    pub fn load_events(
        &self,
        events: impl IntoIterator<Item = CatalogXmlEvent>,
        source_uri: &str,
    ) -> Result<LoadedCatalog> {
        let base = uri::parse_absolute(source_uri)?;
        let mut parser = Parser {
            strict: self.strict,
            base_stack: vec![base],
            prefer_stack: vec![Prefer::Public],
            source_uri: source_uri.to_string(),
        };
        parser.run(events.into_iter())
    }
}

/// Walks a flat event stream, maintaining the `xml:base` and `prefer` stacks described
/// in spec §4.1/§9, and produces the entry tree via straightforward recursive-descent
/// driven by an explicit frame stack (so it works the same whether the events came
/// from a real document or a synthetic one).
struct Parser {
    strict: bool,
    base_stack: Vec<Url>,
    prefer_stack: Vec<Prefer>,
    source_uri: String,
}

/// An in-progress `group`/`catalog` frame awaiting its closing tag.
struct Frame {
    common: EntryCommon,
    prefer: Prefer,
    children: Vec<Entry>,
    is_root: bool,
    pushed_base: bool,
    pushed_prefer: bool,
}

impl Parser {
    fn run(&mut self, events: impl Iterator<Item = CatalogXmlEvent>) -> Result<LoadedCatalog> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<LoadedCatalog> = None;

        for event in events {
            match event {
                CatalogXmlEvent::Start {
                    local_name,
                    in_catalog_ns,
                    attributes,
                } => {
                    if !in_catalog_ns {
                        // Unknown-namespace elements are ignored wholesale, but we
                        // still need a placeholder frame so the matching End doesn't
                        // pop something else.
                        stack.push(self.skip_frame());
                        continue;
                    }

                    let xml_base = attr(&attributes, "base_in_xml_ns");
                    let pushed_base = if let Some(base) = xml_base {
                        let resolved = uri::resolve(self.base_stack.last(), &base)?;
                        self.base_stack.push(resolved);
                        true
                    } else {
                        false
                    };
                    let effective_base = self.base_stack.last().cloned().unwrap();

                    match local_name.as_str() {
                        "catalog" | "group" => {
                            let prefer = attr(&attributes, "prefer")
                                .map(|p| Prefer::parse(&p))
                                .unwrap_or(*self.prefer_stack.last().unwrap());
                            self.prefer_stack.push(prefer);
                            stack.push(Frame {
                                common: EntryCommon {
                                    id: attr(&attributes, "id"),
                                    base_uri: effective_base.to_string(),
                                },
                                prefer,
                                children: Vec::new(),
                                is_root: local_name == "catalog" && stack.is_empty(),
                                pushed_base,
                                pushed_prefer: true,
                            });
                        }
                        _ => {
                            let common = EntryCommon {
                                id: attr(&attributes, "id"),
                                base_uri: effective_base.to_string(),
                            };
                            match self.build_leaf(&local_name, &attributes, common, &effective_base) {
                                Ok(Some(entry)) => {
                                    if let Some(frame) = stack.last_mut() {
                                        frame.children.push(entry);
                                    } else if self.strict {
                                        return Err(Error::CatalogParse {
                                            source: self.source_uri.clone(),
                                            reason: format!(
                                                "entry '{}' outside of a catalog root",
                                                local_name
                                            ),
                                        });
                                    }
                                }
                                Ok(None) => {
                                    // Dropped tolerant-mode entry (already logged).
                                }
                                Err(e) => {
                                    if self.strict {
                                        return Err(e);
                                    }
                                    tracing::warn!(
                                        entry = %local_name,
                                        error = %e,
                                        "dropping malformed catalog entry"
                                    );
                                }
                            }
                            // Leaf elements never have meaningful children; push a
                            // no-op frame purely to balance the matching End.
                            if !matches!(local_name.as_str(), "catalog" | "group") {
                                stack.push(self.skip_frame());
                            }
                        }
                    }
                }
                CatalogXmlEvent::End => {
                    let frame = stack.pop().ok_or_else(|| Error::CatalogParse {
                        source: self.source_uri.clone(),
                        reason: "unbalanced end tag".to_string(),
                    })?;
                    if frame.pushed_base {
                        self.base_stack.pop();
                    }
                    if frame.pushed_prefer {
                        self.prefer_stack.pop();
                    }

                    if frame.is_root {
                        root = Some(LoadedCatalog {
                            source: self.source_uri.clone(),
                            prefer: frame.prefer,
                            entries: frame.children,
                        });
                    } else if let Some(parent) = stack.last_mut() {
                        if !frame.children.is_empty() || frame.pushed_prefer {
                            parent.children.push(Entry::Group {
                                common: frame.common,
                                prefer: frame.prefer,
                                children: frame.children,
                            });
                        }
                    }
                }
            }
        }

        root.ok_or_else(|| Error::CatalogParse {
            source: self.source_uri.clone(),
            reason: "no <catalog> root element found".to_string(),
        })
    }

    fn skip_frame(&self) -> Frame {
        Frame {
            common: EntryCommon::default(),
            prefer: *self.prefer_stack.last().unwrap(),
            children: Vec::new(),
            is_root: false,
            pushed_base: false,
            pushed_prefer: false,
        }
    }

    /// Build one non-container entry. `Ok(None)` means "silently drop" (tolerant
    /// mode, missing required attribute); `Err` means "malformed", surfaced in strict
    /// mode and logged-and-dropped otherwise.
    fn build_leaf(
        &self,
        local_name: &str,
        attrs: &[(String, String)],
        common: EntryCommon,
        base: &Url,
    ) -> Result<Option<Entry>> {
        let resolve = |value: &str| -> Result<String> {
            Ok(uri::resolve(Some(base), &uri::normalize_classpath(value))?.to_string())
        };

        macro_rules! required {
            ($name:expr) => {
                match attr(attrs, $name) {
                    Some(v) => v,
                    None if self.strict => {
                        return Err(Error::CatalogParse {
                            source: self.source_uri.clone(),
                            reason: format!(
                                "missing required attribute '{}' on <{}>",
                                $name, local_name
                            ),
                        })
                    }
                    None => return Ok(None),
                }
            };
        }

        let entry = match local_name {
            "public" => {
                let public_id = required!("publicId");
                let uri_val = required!("uri");
                Entry::Public {
                    common,
                    public_id,
                    uri: resolve(&uri_val)?,
                    resolved_prefer: Prefer::Public, // patched by caller once scopes settle
                }
            }
            "system" => {
                let system_id = required!("systemId");
                let uri_val = required!("uri");
                Entry::System {
                    common,
                    system_id,
                    uri: resolve(&uri_val)?,
                }
            }
            "uri" => {
                let name = required!("name");
                let uri_val = required!("uri");
                Entry::Uri {
                    common,
                    name,
                    uri: resolve(&uri_val)?,
                    nature: attr(attrs, "nature"),
                    purpose: attr(attrs, "purpose"),
                }
            }
            "rewriteSystem" => {
                let start = required!("systemIdStartString");
                let prefix = required!("rewritePrefix");
                Entry::RewriteSystem {
                    common,
                    system_id_start: start,
                    rewrite_prefix: resolve(&prefix)?,
                }
            }
            "rewriteURI" => {
                let start = required!("uriStartString");
                let prefix = required!("rewritePrefix");
                Entry::RewriteUri {
                    common,
                    uri_start: start,
                    rewrite_prefix: resolve(&prefix)?,
                }
            }
            "systemSuffix" => {
                let suffix = required!("systemIdSuffix");
                let uri_val = required!("uri");
                Entry::SystemSuffix {
                    common,
                    system_id_suffix: suffix,
                    uri: resolve(&uri_val)?,
                }
            }
            "uriSuffix" => {
                let suffix = required!("uriSuffix");
                let uri_val = required!("uri");
                Entry::UriSuffix {
                    common,
                    uri_suffix: suffix,
                    uri: resolve(&uri_val)?,
                }
            }
            "delegatePublic" => {
                let start = required!("publicIdStartString");
                let catalog = required!("catalog");
                Entry::DelegatePublic {
                    common,
                    public_id_start: start,
                    catalog_uri: resolve(&catalog)?,
                }
            }
            "delegateSystem" => {
                let start = required!("systemIdStartString");
                let catalog = required!("catalog");
                Entry::DelegateSystem {
                    common,
                    system_id_start: start,
                    catalog_uri: resolve(&catalog)?,
                }
            }
            "delegateURI" => {
                let start = required!("uriStartString");
                let catalog = required!("catalog");
                Entry::DelegateUri {
                    common,
                    uri_start: start,
                    catalog_uri: resolve(&catalog)?,
                }
            }
            "nextCatalog" => {
                let catalog = required!("catalog");
                Entry::NextCatalog {
                    common,
                    catalog_uri: resolve(&catalog)?,
                }
            }
            "doctype" => {
                let name = required!("name");
                let uri_val = required!("uri");
                Entry::Doctype {
                    common,
                    name,
                    uri: resolve(&uri_val)?,
                }
            }
            "document" => {
                let uri_val = required!("uri");
                Entry::Document {
                    common,
                    uri: resolve(&uri_val)?,
                }
            }
            "dtddecl" => {
                let public_id = required!("publicId");
                let uri_val = required!("uri");
                Entry::DtdDecl {
                    common,
                    public_id,
                    uri: resolve(&uri_val)?,
                }
            }
            "entity" => {
                let name = required!("name");
                let uri_val = required!("uri");
                Entry::Tr9401Entity {
                    common,
                    name,
                    uri: resolve(&uri_val)?,
                }
            }
            "linktype" => {
                let name = required!("name");
                let uri_val = required!("uri");
                Entry::LinkType {
                    common,
                    name,
                    uri: resolve(&uri_val)?,
                }
            }
            "notation" => {
                let name = required!("name");
                let uri_val = required!("uri");
                Entry::Notation {
                    common,
                    name,
                    uri: resolve(&uri_val)?,
                }
            }
            "sgmldecl" => {
                let uri_val = required!("uri");
                Entry::SgmlDecl {
                    common,
                    uri: resolve(&uri_val)?,
                }
            }
            _ => return Ok(None), // unknown element in the catalog NS: ignore
        };
        Ok(Some(entry))
    }
}

fn attr(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Translate a `quick-xml` event stream over `xml` into [`CatalogXmlEvent`]s, resolving
/// namespaces so elements outside the catalog/TR9401 namespaces are flagged rather than
/// dropped at this layer (the state machine decides what to do with them).
fn quick_xml_events(xml: &str, source_uri: &str) -> Result<Vec<CatalogXmlEvent>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut ns_stack: Vec<Vec<(String, String)>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                push_start(&mut out, &mut ns_stack, &e, false)?;
            }
            Ok(Event::Empty(e)) => {
                push_start(&mut out, &mut ns_stack, &e, true)?;
            }
            Ok(Event::End(_)) => {
                ns_stack.pop();
                out.push(CatalogXmlEvent::End);
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::CatalogParse {
                    source: source_uri.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(out)
}

fn push_start(
    out: &mut Vec<CatalogXmlEvent>,
    ns_stack: &mut Vec<Vec<(String, String)>>,
    e: &BytesStart,
    is_empty: bool,
) -> Result<()> {
    let mut declared = Vec::new();
    let mut raw_attrs = Vec::new();
    let mut xml_base = None;

    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| Error::CatalogParse {
            source: String::new(),
            reason: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attribute.value).to_string());

        if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        } else if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if key == "xml:base" {
            xml_base = Some(value.clone());
        } else {
            let local = key.rsplit(':').next().unwrap_or(&key).to_string();
            raw_attrs.push((local, value));
        }
    }
    if let Some(base) = xml_base {
        raw_attrs.push(("base_in_xml_ns".to_string(), base));
    }
    ns_stack.push(declared.clone());

    let full_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let (prefix, local_name) = match full_name.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, full_name.clone()),
    };

    let ns_uri = resolve_ns(ns_stack, prefix.as_deref());
    let in_catalog_ns = matches!(ns_uri.as_deref(), Some(CATALOG_NS) | Some(TR9401_NS));

    out.push(CatalogXmlEvent::Start {
        local_name,
        in_catalog_ns,
        attributes: raw_attrs,
    });
    if is_empty {
        out.push(CatalogXmlEvent::End);
        ns_stack.pop();
    }
    Ok(())
}

fn resolve_ns(ns_stack: &[Vec<(String, String)>], prefix: Option<&str>) -> Option<String> {
    let key = prefix.unwrap_or("");
    for scope in ns_stack.iter().rev() {
        if let Some((_, uri)) = scope.iter().find(|(p, _)| p == key) {
            return Some(uri.clone());
        }
    }
    None
}

/// Walk a freshly loaded tree once and patch every [`Entry::Public`]'s
/// `resolved_prefer` to the nearest enclosing `group`/`catalog` scope (decision (a)).
pub fn resolve_prefer_scopes(catalog: &mut LoadedCatalog) {
    patch_children(&mut catalog.entries, catalog.prefer);
}

fn patch_children(entries: &mut [Entry], inherited: Prefer) {
    for entry in entries.iter_mut() {
        match entry {
            Entry::Public {
                resolved_prefer, ..
            } => *resolved_prefer = inherited,
            Entry::Group { prefer, children, .. } => {
                let scope = *prefer;
                patch_children(children, scope);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(xml: &str) -> LoadedCatalog {
        let mut cat = CatalogLoader::new()
            .load_str(xml, "file:///cat/catalog.xml")
            .unwrap();
        resolve_prefer_scopes(&mut cat);
        cat
    }

    #[test]
    fn parses_system_and_uri_entries() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="-//OASIS//DTD DocBook XML V4.5//EN" uri="docbook.dtd"/>
  <uri name="http://example.com/x" uri="x.xml"/>
</catalog>"#,
        );
        assert_eq!(cat.iter_local().count(), 2);
        match &cat.entries[0] {
            Entry::System { system_id, uri, .. } => {
                assert_eq!(system_id, "-//OASIS//DTD DocBook XML V4.5//EN");
                assert_eq!(uri, "file:///cat/docbook.dtd");
            }
            other => panic!("expected system entry, got {:?}", other),
        }
    }

    #[test]
    fn xml_base_overrides_nested_resolution() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <group xml:base="file:///other/">
    <system systemId="urn:x" uri="schema.xsd"/>
  </group>
</catalog>"#,
        );
        let group = &cat.entries[0];
        match group {
            Entry::Group { children, .. } => match &children[0] {
                Entry::System { uri, .. } => assert_eq!(uri, "file:///other/schema.xsd"),
                other => panic!("expected system, got {:?}", other),
            },
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_attribute_drops_entry_tolerantly() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="urn:incomplete"/>
  <uri name="ok" uri="ok.xml"/>
</catalog>"#,
        );
        assert_eq!(cat.iter_local().count(), 1);
    }

    #[test]
    fn strict_loader_aborts_on_missing_attribute() {
        let xml = r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="broken"/>
</catalog>"#;
        // Tolerant mode drops it silently:
        let tolerant = CatalogLoader::new().load_str(xml, "file:///c.xml").unwrap();
        assert_eq!(tolerant.entries.len(), 0);

        // Strict mode aborts the whole load instead.
        let err = CatalogLoader::strict().load_str(xml, "file:///c.xml").unwrap_err();
        assert!(matches!(err, Error::CatalogParse { .. }));
    }

    #[test]
    fn classpath_uri_normalized_at_load_time() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="x" uri="classpath:/a/b.xml"/>
</catalog>"#,
        );
        match &cat.entries[0] {
            Entry::Uri { uri, .. } => assert_eq!(uri, "classpath:a/b.xml"),
            other => panic!("expected uri entry, got {:?}", other),
        }
    }

    #[test]
    fn prefer_resolved_from_nearest_enclosing_group() {
        let cat = load(
            r#"<?xml version="1.0"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog" prefer="public">
  <group prefer="system">
    <public publicId="-//X//Y//EN" uri="y.xml"/>
  </group>
  <public publicId="-//A//B//EN" uri="b.xml"/>
</catalog>"#,
        );
        let group = &cat.entries[0];
        let nested_public = &group.children()[0];
        match nested_public {
            Entry::Public { resolved_prefer, .. } => assert_eq!(*resolved_prefer, Prefer::System),
            other => panic!("expected public, got {:?}", other),
        }
        match &cat.entries[1] {
            Entry::Public { resolved_prefer, .. } => assert_eq!(*resolved_prefer, Prefer::Public),
            other => panic!("expected public, got {:?}", other),
        }
    }
}
