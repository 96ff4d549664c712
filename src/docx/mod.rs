pub mod builder;
pub mod document;
pub mod package;
pub mod paragraphs;
pub mod xml;

pub use document::WordDocument;
