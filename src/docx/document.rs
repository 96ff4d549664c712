use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use super::package::{DocxPackage, DOCUMENT_PART};
use super::paragraphs::{body_paragraphs, Paragraph};
use super::xml::{parse_xml_part, verify_skeleton_unchanged, write_xml_part, XmlPart};

/// An opened `.docx` with its main document part parsed.
pub struct WordDocument {
    package: DocxPackage,
    body: XmlPart,
}

impl WordDocument {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let package = DocxPackage::read(path)?;
        let entry = package
            .entry(DOCUMENT_PART)
            .with_context(|| format!("{} has no {DOCUMENT_PART}", path.display()))?;
        let body = parse_xml_part(&entry.name, &entry.data)
            .with_context(|| format!("parse xml: {}", entry.name))?;
        Ok(Self { package, body })
    }

    pub fn paragraphs(&self) -> Vec<Paragraph> {
        body_paragraphs(&self.body)
    }

    /// Trimmed paragraph texts in document order, blank paragraphs dropped.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.paragraphs()
            .into_iter()
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub(crate) fn body_mut(&mut self) -> &mut XmlPart {
        &mut self.body
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        verify_skeleton_unchanged(&self.body)?;
        let bytes = write_xml_part(&self.body)
            .with_context(|| format!("serialize xml: {}", self.body.name))?;
        let mut replacements = HashMap::new();
        replacements.insert(self.body.name.clone(), bytes);
        self.package.write_with_replacements(path, &replacements)
    }
}
