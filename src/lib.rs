//! Justification letters from purchase request documents.
//!
//! A purchase request `.docx` is scanned for labelled fields and its item
//! table ([`extract`]); the values are then written into the `[FIELD]`
//! placeholders of a letter template ([`fill`]). [`letter`] runs both steps and
//! [`server`] exposes them over HTTP.

pub mod config;
pub mod docx;
pub mod error;
pub mod extract;
pub mod fields;
pub mod fill;
pub mod letter;
pub mod progress;
pub mod server;
pub mod textutil;

pub use error::LetterError;
pub use fields::{Field, FieldMap, LineItemTable, NO_DATA};
