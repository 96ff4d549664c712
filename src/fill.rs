//! Substitutes `[FIELD]` placeholders in the letter template.

use std::collections::BTreeSet;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::docx::WordDocument;
use crate::fields::FieldMap;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[A-Z][A-Z0-9_]*\]").expect("placeholder regex"));

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    pub replacements: usize,
    pub paragraphs_touched: usize,
    /// Placeholder-shaped tokens still in the output, e.g. `[UNKNOWN_FIELD]`.
    pub unresolved: BTreeSet<String>,
}

/// Replaces every known placeholder in `text`.
///
/// Fields are applied one after another in [`crate::fields::Field::ALL`]
/// order, each against the text left by the previous one.
pub fn fill_text(text: &str, fields: &FieldMap) -> String {
    let mut out = text.to_string();
    for (field, value) in fields.iter() {
        let placeholder = field.placeholder();
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}

/// Applies [`fill_text`] semantics to every body paragraph of `doc` in place.
pub fn fill_document(doc: &mut WordDocument, fields: &FieldMap) -> anyhow::Result<FillReport> {
    let mut report = FillReport::default();
    let mut paragraphs = doc.paragraphs();
    let part = doc.body_mut();

    for para in paragraphs.iter_mut() {
        let before = report.replacements;
        for (field, value) in fields.iter() {
            let placeholder = field.placeholder();
            let hits: Vec<usize> = para
                .text
                .match_indices(placeholder.as_str())
                .map(|(at, _)| at)
                .collect();
            // Right to left so earlier offsets stay valid.
            for at in hits.into_iter().rev() {
                para.splice(part, at..at + placeholder.len(), value)
                    .with_context(|| format!("replace {placeholder} in paragraph {}", para.index))?;
                report.replacements += 1;
            }
        }
        if report.replacements > before {
            report.paragraphs_touched += 1;
            debug!(paragraph = para.index, text = %para.text, "paragraph filled");
        }
        report.unresolved.extend(
            PLACEHOLDER_RE
                .find_iter(&para.text)
                .map(|m| m.as_str().to_string()),
        );
    }

    if !report.unresolved.is_empty() {
        warn!(unresolved = ?report.unresolved, "template placeholders left unfilled");
    }
    Ok(report)
}
