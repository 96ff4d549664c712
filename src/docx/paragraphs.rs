use std::ops::Range;

use anyhow::{anyhow, bail, Context};

use super::xml::{XmlEvent, XmlPart};

/// A `w:t` text node inside a body paragraph.
#[derive(Clone, Debug)]
pub struct TextNode {
    pub elem_event_index: usize,
    pub text_event_index: usize,
    /// Byte offset of this node inside the paragraph's logical text.
    pub offset: usize,
    pub text: String,
}

impl TextNode {
    fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// A body-level `w:p` with its logical plain text.
///
/// Text is the concatenation of run text in document order, with `w:tab` as
/// `\t` and text-wrapping breaks as `\n`. Control characters have no text node
/// behind them, so they sit in the gaps between `nodes`.
#[derive(Clone, Debug)]
pub struct Paragraph {
    pub index: usize,
    pub start_event_index: usize,
    pub text: String,
    pub nodes: Vec<TextNode>,
}

impl Paragraph {
    /// Overwrites `range` of the logical text with `replacement`.
    ///
    /// The replacement is written into the text node where the range starts;
    /// the remainder of the range is cut from the following nodes. The range
    /// must be covered by text nodes only.
    pub fn splice(
        &mut self,
        part: &mut XmlPart,
        range: Range<usize>,
        replacement: &str,
    ) -> anyhow::Result<()> {
        let Range { start, end } = range;
        if start >= end || end > self.text.len() {
            bail!(
                "splice range {start}..{end} outside paragraph {} (len {})",
                self.index,
                self.text.len()
            );
        }
        let covered: usize = self
            .nodes
            .iter()
            .map(|n| n.end().min(end).saturating_sub(n.offset.max(start)))
            .sum();
        if covered != end - start {
            bail!(
                "splice range {start}..{end} crosses a tab or break in paragraph {}",
                self.index
            );
        }
        let anchor = self
            .nodes
            .iter()
            .position(|n| n.offset <= start && start < n.end())
            .context("no text node at splice start")?;

        let removed = end - start;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let (n_start, n_end) = (node.offset, node.end());
            if i == anchor {
                let cut_to = end.min(n_end) - n_start;
                let mut text = String::with_capacity(node.text.len() + replacement.len());
                text.push_str(&node.text[..start - n_start]);
                text.push_str(replacement);
                text.push_str(&node.text[cut_to..]);
                node.text = text;
            } else if n_start >= end {
                node.offset = n_start + replacement.len() - removed;
                continue;
            } else if n_start > start {
                let cut_to = end.min(n_end) - n_start;
                node.text = node.text[cut_to..].to_string();
                node.offset = start + replacement.len();
            } else {
                continue;
            }
            write_node_text(part, node)?;
        }

        self.text.replace_range(start..end, replacement);
        Ok(())
    }
}

fn write_node_text(part: &mut XmlPart, node: &TextNode) -> anyhow::Result<()> {
    match part.events.get_mut(node.text_event_index) {
        Some(XmlEvent::Text { text }) => *text = node.text.clone(),
        _ => {
            return Err(anyhow!(
                "expected text event at {} in {}",
                node.text_event_index,
                part.name
            ))
        }
    }
    let edge_space = node.text.starts_with(char::is_whitespace)
        || node.text.ends_with(char::is_whitespace);
    if edge_space {
        let elem = part
            .events
            .get_mut(node.elem_event_index)
            .context("text element index out of range")?;
        set_attr_value(elem, "xml:space", "preserve");
    }
    Ok(())
}

fn set_attr_value(ev: &mut XmlEvent, key: &str, value: &str) {
    if let XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } = ev {
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((key.to_string(), value.to_string())),
        }
    }
}

fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn control_append(buf: &mut String, name: &str, attrs: &[(String, String)]) {
    match name {
        "w:tab" | "w:ptab" => buf.push('\t'),
        "w:cr" => buf.push('\n'),
        "w:br" => {
            if find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping" {
                buf.push('\n');
            }
        }
        "w:noBreakHyphen" => buf.push('-'),
        _ => {}
    }
}

fn is_control(name: &str) -> bool {
    matches!(
        name,
        "w:tab" | "w:ptab" | "w:cr" | "w:br" | "w:noBreakHyphen"
    )
}

#[derive(Default)]
struct Capture {
    start_event_index: usize,
    p_depth: usize,
    hyperlink_depth: Option<usize>,
    run_depth: Option<usize>,
    t_elem: Option<(usize, usize)>,
    text: String,
    nodes: Vec<TextNode>,
}

impl Capture {
    fn in_run(&self, parent_depth: usize) -> bool {
        self.run_depth == Some(parent_depth)
    }
}

/// Collects the direct `w:body/w:p` paragraphs of a document part.
///
/// Only runs that are direct children of the paragraph or of a
/// `w:hyperlink` contribute text; paragraphs nested in tables, text boxes or
/// other containers are not part of the body sequence.
pub fn body_paragraphs(part: &XmlPart) -> Vec<Paragraph> {
    let mut out: Vec<Paragraph> = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut capture: Option<Capture> = None;

    for (idx, ev) in part.events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, attrs } => {
                let depth = stack.len();
                let parent = stack.last().copied().unwrap_or("");
                if name == "w:p" && parent == "w:body" && capture.is_none() {
                    capture = Some(Capture {
                        start_event_index: idx,
                        p_depth: depth + 1,
                        ..Default::default()
                    });
                } else if let Some(cap) = capture.as_mut() {
                    match name.as_str() {
                        "w:hyperlink" if depth == cap.p_depth => {
                            cap.hyperlink_depth = Some(depth + 1);
                        }
                        "w:r" if depth == cap.p_depth || cap.hyperlink_depth == Some(depth) => {
                            cap.run_depth = Some(depth + 1);
                        }
                        "w:t" if cap.in_run(depth) => cap.t_elem = Some((idx, depth + 1)),
                        n if is_control(n) && cap.in_run(depth) => {
                            control_append(&mut cap.text, n, attrs);
                        }
                        _ => {}
                    }
                }
                stack.push(name.as_str());
            }
            XmlEvent::Empty { name, attrs } => {
                if let Some(cap) = capture.as_mut() {
                    if is_control(name) && cap.in_run(stack.len()) {
                        control_append(&mut cap.text, name, attrs);
                    }
                } else if name == "w:p" && stack.last() == Some(&"w:body") {
                    out.push(Paragraph {
                        index: out.len(),
                        start_event_index: idx,
                        text: String::new(),
                        nodes: Vec::new(),
                    });
                }
            }
            XmlEvent::Text { text } => {
                if let Some(cap) = capture.as_mut() {
                    if let Some((elem_idx, t_depth)) = cap.t_elem {
                        if t_depth == stack.len() {
                            cap.nodes.push(TextNode {
                                elem_event_index: elem_idx,
                                text_event_index: idx,
                                offset: cap.text.len(),
                                text: text.clone(),
                            });
                            cap.text.push_str(text);
                        }
                    }
                }
            }
            XmlEvent::End { name } => {
                let depth = stack.len();
                let mut closes_paragraph = false;
                if let Some(cap) = capture.as_mut() {
                    if cap.t_elem.is_some_and(|(_, d)| d == depth) {
                        cap.t_elem = None;
                    }
                    if cap.run_depth == Some(depth) {
                        cap.run_depth = None;
                    }
                    if cap.hyperlink_depth == Some(depth) {
                        cap.hyperlink_depth = None;
                    }
                    closes_paragraph = name == "w:p" && depth == cap.p_depth;
                }
                if closes_paragraph {
                    if let Some(done) = capture.take() {
                        out.push(Paragraph {
                            index: out.len(),
                            start_event_index: done.start_event_index,
                            text: done.text,
                            nodes: done.nodes,
                        });
                    }
                }
                stack.pop();
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::body_paragraphs;
    use crate::docx::xml::{parse_xml_part, write_xml_part};

    const DOC: &str = concat!(
        r#"<w:document><w:body>"#,
        r#"<w:p><w:r><w:t>Nomor PR: </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>PR-7</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>in table</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:br w:type="page"/></w:r></w:p>"#,
        r#"<w:p><w:hyperlink><w:r><w:t>[NAMA_</w:t></w:r></w:hyperlink><w:r><w:t>PENERIMA]</w:t></w:r></w:p>"#,
        r#"<w:p/>"#,
        r#"</w:body></w:document>"#
    );

    #[test]
    fn collects_body_paragraph_text() {
        let part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let paras = body_paragraphs(&part);
        let texts: Vec<&str> = paras.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Nomor PR: PR-7", "a\tb\n", "[NAMA_PENERIMA]", ""]);
        assert_eq!(paras[3].index, 3);
        assert_eq!(paras[1].nodes.len(), 2);
        assert_eq!(paras[1].nodes[1].offset, 2);
    }

    #[test]
    fn splice_across_runs_keeps_first_run() {
        let mut part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let mut paras = body_paragraphs(&part);
        let para = &mut paras[2];
        para.splice(&mut part, 0..15, "Budi").expect("splice");
        assert_eq!(para.text, "Budi");
        assert_eq!(para.nodes[0].text, "Budi");
        assert_eq!(para.nodes[1].text, "");
        assert_eq!(para.nodes[1].offset, 4);

        let reread = body_paragraphs(&part);
        assert_eq!(reread[2].text, "Budi");
        let xml = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(xml.contains("<w:hyperlink><w:r><w:t>Budi</w:t></w:r></w:hyperlink>"));
    }

    #[test]
    fn splice_marks_edge_whitespace_preserved() {
        let mut part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let mut paras = body_paragraphs(&part);
        paras[0].splice(&mut part, 10..14, " ").expect("splice");
        assert_eq!(paras[0].text, "Nomor PR:  ");
        let xml = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(xml.contains(r#"<w:t xml:space="preserve"> </w:t>"#));
    }

    #[test]
    fn splice_rejects_range_over_tab() {
        let mut part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let mut paras = body_paragraphs(&part);
        assert!(paras[1].splice(&mut part, 0..3, "x").is_err());
        assert!(paras[1].splice(&mut part, 0..10, "x").is_err());
    }
}
