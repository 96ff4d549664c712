use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

#[derive(Clone, Debug)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

/// One XML part of the package as a flat event list.
///
/// `skeleton` is the digest of everything a placeholder fill must not touch,
/// captured when the part was parsed.
#[derive(Clone)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
    pub skeleton: String,
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("read xml event in {name}"))?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d.encoding().and_then(|r| r.ok()).map(bytes_to_string);
                let standalone = d.standalone().and_then(|r| r.ok()).map(bytes_to_string);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => events.push(XmlEvent::Start {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::End(e) => events.push(XmlEvent::End {
                name: bytes_to_string(e.name().as_ref()),
            }),
            Event::Empty(s) => events.push(XmlEvent::Empty {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::Text(t) => {
                let text = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => events.push(XmlEvent::CData {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Comment(t) => events.push(XmlEvent::Comment {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::PI(t) => events.push(XmlEvent::PI {
                content: format!(
                    "{}{}",
                    bytes_to_string(t.target()),
                    bytes_to_string(t.content())
                ),
            }),
            Event::DocType(t) => events.push(XmlEvent::DocType {
                text: bytes_to_string(t.into_inner()),
            }),
        }
    }

    let skeleton = skeleton_digest(&events);
    Ok(XmlPart {
        name: name.to_string(),
        events,
        skeleton,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        // Raw (still escaped) value; written back byte for byte.
        attrs.push((
            bytes_to_string(a.key.as_ref()),
            bytes_to_string(a.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn write_tag(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.push(b'<');
        out.extend_from_slice(name.as_bytes());
        for (k, v) in attrs {
            out.push(b' ');
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.push(b'"');
        }
        out.extend_from_slice(if empty { b"/>" } else { b">" });
    }

    for ev in &part.events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => write_tag(&mut out, name, attrs, false),
            XmlEvent::Empty { name, attrs } => write_tag(&mut out, name, attrs, true),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.push(b'>');
            }
            // Quotes stay literal in text content.
            XmlEvent::Text { text } => out.extend_from_slice(partial_escape(text).as_bytes()),
            XmlEvent::CData { text } => {
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.push(b'>');
            }
        }
    }

    Ok(out)
}

/// Fails when anything outside run text changed since the part was parsed.
pub fn verify_skeleton_unchanged(part: &XmlPart) -> anyhow::Result<()> {
    let current = skeleton_digest(&part.events);
    if current != part.skeleton {
        return Err(anyhow!(
            "non-text structure changed in {} (baseline={} current={})",
            part.name,
            part.skeleton,
            current
        ));
    }
    Ok(())
}

pub(crate) fn is_text_tag(name: &str) -> bool {
    name == "w:t" || name == "w:delText"
}

fn skeleton_digest(events: &[XmlEvent]) -> String {
    let mut hasher = Sha256::new();
    let mut stack: Vec<&str> = Vec::new();

    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => {
                stack.push(name.as_str());
                hash_tag(&mut hasher, name, attrs);
            }
            XmlEvent::Empty { name, attrs } => {
                hash_tag(&mut hasher, name, attrs);
                hash_line(&mut hasher, b"E:", name.as_bytes());
            }
            XmlEvent::End { name } => {
                hash_line(&mut hasher, b"E:", name.as_bytes());
                stack.pop();
            }
            XmlEvent::Text { text } => {
                if stack.last().is_some_and(|cur| is_text_tag(cur)) {
                    continue;
                }
                hash_line(&mut hasher, b"T:", text.as_bytes());
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let decl = format!(
                    "{version}|{}|{}",
                    encoding.as_deref().unwrap_or(""),
                    standalone.as_deref().unwrap_or("")
                );
                hash_line(&mut hasher, b"D:", decl.as_bytes());
            }
            XmlEvent::CData { text } => hash_line(&mut hasher, b"C:", text.as_bytes()),
            XmlEvent::Comment { text } => hash_line(&mut hasher, b"M:", text.as_bytes()),
            XmlEvent::PI { content } => hash_line(&mut hasher, b"P:", content.as_bytes()),
            XmlEvent::DocType { text } => hash_line(&mut hasher, b"Y:", text.as_bytes()),
        }
    }
    hex::encode(hasher.finalize())
}

fn hash_line(hasher: &mut Sha256, tag: &[u8], body: &[u8]) {
    hasher.update(tag);
    hasher.update(body);
    hasher.update(b"\n");
}

fn hash_tag(hasher: &mut Sha256, name: &str, attrs: &[(String, String)]) {
    hasher.update(b"S:");
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    // Sorted so attribute order is irrelevant; xml:space follows the text it guards.
    let sorted: BTreeMap<&str, &str> = attrs
        .iter()
        .filter(|(k, _)| k != "xml:space")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    for (k, v) in sorted {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"\n");
}

#[cfg(test)]
mod tests {
    use super::{parse_xml_part, verify_skeleton_unchanged, write_xml_part, XmlEvent};

    #[test]
    fn write_preserves_attr_entity_refs() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root xmlns:o="urn:test" o:gfxdata="A&#xD;&#xA;B"/>"#;
        let part = parse_xml_part("test.xml", xml).expect("parse xml");
        let out = write_xml_part(&part).expect("write xml");
        let s = String::from_utf8(out).expect("utf8");

        assert!(s.contains(r#"o:gfxdata="A&#xD;&#xA;B""#));
        assert!(!s.contains(r#"o:gfxdata="A&amp;#xD;"#));
    }

    #[test]
    fn text_escapes_survive_rewrite() {
        let xml = br#"<w:p><w:r><w:t>Harga Per Unit &amp; Total:</w:t></w:r></w:p>"#;
        let part = parse_xml_part("document.xml", xml).expect("parse xml");
        let has_plain = part.events.iter().any(|ev| {
            matches!(ev, XmlEvent::Text { text } if text == "Harga Per Unit & Total:")
        });
        assert!(has_plain);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("Harga Per Unit &amp; Total:"));

        let xml = br#"<w:t>a &lt; b &gt; c "d" 'e'</w:t>"#;
        let part = parse_xml_part("document.xml", xml).expect("parse xml");
        let out = write_xml_part(&part).expect("write");
        assert_eq!(out, xml.to_vec());
    }

    #[test]
    fn skeleton_ignores_run_text_but_not_tags() {
        let xml = br#"<w:p><w:r><w:t>[NOMOR_SURAT]</w:t></w:r></w:p>"#;
        let mut part = parse_xml_part("document.xml", xml).expect("parse xml");
        for ev in part.events.iter_mut() {
            if let XmlEvent::Text { text } = ev {
                *text = "PR-001".to_string();
            }
        }
        verify_skeleton_unchanged(&part).expect("text-only edit is allowed");

        part.events.push(XmlEvent::Empty {
            name: "w:br".to_string(),
            attrs: Vec::new(),
        });
        assert!(verify_skeleton_unchanged(&part).is_err());
    }
}
