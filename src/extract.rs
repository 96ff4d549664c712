//! Pulls letter fields out of a purchase request.
//!
//! The request is read as a list of trimmed, non-blank paragraph lines. Scalar
//! fields come from `Label: value` lines; the item table comes from two
//! independent section scans.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::docx::WordDocument;
use crate::fields::{Field, FieldMap, LineItemTable};

/// Paragraph text that opens the item/quantity section.
pub const ITEMS_MARKER: &str = "Deskripsi Barang/Jasa:";
/// Paragraph text that opens the unit price/total section.
pub const PRICING_MARKER: &str = "Harga Per Unit & Total:";

struct LabelRule {
    field: Field,
    pattern: Regex,
}

static LABEL_RULES: Lazy<Vec<LabelRule>> = Lazy::new(|| {
    Field::SCALARS
        .into_iter()
        .filter_map(|field| {
            let label = field.label()?;
            let pattern = Regex::new(&format!(r"{}:\s*(.*)", regex::escape(label)))
                .expect("label regex");
            Some(LabelRule { field, pattern })
        })
        .collect()
});

// e.g. "Laptop Dell XPS 15 - 5 unit"
static ITEM_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*) - (\d+) unit").expect("item row regex"));

// e.g. "Laptop Dell XPS 15 - Rp 25.000.000 x 5 = Rp 125.000.000"
static PRICE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.* - Rp ([\d.]+) x (\d+) = Rp ([\d.]+)").expect("price row regex")
});

#[derive(Clone, Debug, Default)]
pub struct Extraction {
    /// All scalar fields that matched plus the four list fields.
    pub fields: FieldMap,
    pub table: LineItemTable,
}

impl Extraction {
    pub fn missing(&self) -> Vec<Field> {
        self.fields.missing_scalars()
    }
}

pub fn extract(doc: &WordDocument) -> FieldMap {
    extract_lines(&doc.paragraph_texts()).fields
}

pub fn extract_lines(lines: &[String]) -> Extraction {
    let mut fields = FieldMap::new();
    for rule in LABEL_RULES.iter() {
        let hit = lines
            .iter()
            .find_map(|line| rule.pattern.captures(line))
            .and_then(|caps| caps.get(1));
        if let Some(value) = hit {
            debug!(field = %rule.field, value = value.as_str(), "field matched");
            fields.insert(rule.field, value.as_str().trim());
        }
    }

    let table = extract_table(lines);
    table.write_into(&mut fields);
    Extraction { fields, table }
}

pub fn extract_table(lines: &[String]) -> LineItemTable {
    let mut table = LineItemTable::default();

    for row in section_rows(lines, ITEMS_MARKER) {
        if let Some(caps) = ITEM_ROW_RE.captures(row) {
            table.items.push(caps[1].trim().to_string());
            table.quantities.push(caps[2].trim().to_string());
        }
    }

    // The quantity in a price row is not checked against the item rows.
    for row in section_rows(lines, PRICING_MARKER) {
        if let Some(caps) = PRICE_ROW_RE.captures(row) {
            table.unit_prices.push(caps[1].trim().to_string());
            table.totals.push(caps[3].trim().to_string());
        }
    }

    debug!(
        items = table.items.len(),
        prices = table.unit_prices.len(),
        "line items parsed"
    );
    table
}

/// Lines after the first `marker` line, through the end of the document.
/// Marker lines themselves are never rows.
fn section_rows<'a>(lines: &'a [String], marker: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let mut active = false;
    lines.iter().filter_map(move |line| {
        if line.contains(marker) {
            active = true;
            return None;
        }
        (active && !line.trim().is_empty()).then_some(line.as_str())
    })
}
