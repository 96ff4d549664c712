use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::package::DOCUMENT_PART;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = r#"<w:sectPr/></w:body></w:document>"#;

/// Writes a minimal WordprocessingML package with one paragraph per line.
///
/// Tabs inside a line become `w:tab` elements; everything else is one run.
pub fn write_docx<S: AsRef<str>>(path: &Path, paragraphs: &[S]) -> anyhow::Result<()> {
    let f = File::create(path).with_context(|| format!("create docx: {}", path.display()))?;
    let mut zout = ZipWriter::new(f);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 3] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        (DOCUMENT_PART, document_xml(paragraphs)),
    ];
    for (name, body) in parts {
        zout.start_file(name, opts)
            .with_context(|| format!("start zip file: {name}"))?;
        zout.write_all(body.as_bytes())
            .with_context(|| format!("write zip file: {name}"))?;
    }
    zout.finish().context("finish zip")?;
    Ok(())
}

fn document_xml<S: AsRef<str>>(paragraphs: &[S]) -> String {
    let mut xml = String::from(DOCUMENT_HEAD);
    for para in paragraphs {
        let para = para.as_ref();
        if para.is_empty() {
            xml.push_str("<w:p/>");
            continue;
        }
        xml.push_str("<w:p><w:r>");
        for (i, chunk) in para.split('\t').enumerate() {
            if i > 0 {
                xml.push_str("<w:tab/>");
            }
            if !chunk.is_empty() {
                xml.push_str(r#"<w:t xml:space="preserve">"#);
                xml.push_str(&escape(chunk));
                xml.push_str("</w:t>");
            }
        }
        xml.push_str("</w:r></w:p>");
    }
    xml.push_str(DOCUMENT_TAIL);
    xml
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::write_docx;
    use crate::docx::document::WordDocument;

    #[test]
    fn written_docx_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pr.docx");
        write_docx(&path, &["Harga Per Unit & Total:", "", "a\tb"]).expect("write");

        let doc = WordDocument::open(&path).expect("open");
        let texts: Vec<String> = doc.paragraphs().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, vec!["Harga Per Unit & Total:", "", "a\tb"]);
        assert_eq!(
            doc.paragraph_texts(),
            vec!["Harga Per Unit & Total:".to_string(), "a\tb".to_string()]
        );
    }
}
