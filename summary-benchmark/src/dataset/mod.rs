//! Source documents: abstracts with their reference plain-language summaries

pub mod loader;

pub use loader::{load_documents, parse_documents, LoadError};

use serde::{Deserialize, Serialize};

/// One research paper from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Zero-based position in the dataset file
    pub index: usize,
    /// Abstract, with list-valued abstracts flattened and space-joined
    pub abstract_text: String,
    /// Reference plain-language summary
    pub reference: String,
    pub title: Option<String>,
    pub year: Option<String>,
    pub keywords: Vec<String>,
}

impl Document {
    pub fn new(index: usize, abstract_text: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            index,
            abstract_text: abstract_text.into(),
            reference: reference.into(),
            title: None,
            year: None,
            keywords: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Both an abstract and a reference summary are present
    pub fn is_usable(&self) -> bool {
        !self.abstract_text.trim().is_empty() && !self.reference.trim().is_empty()
    }

    /// Which required field is missing, for log messages
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.abstract_text.trim().is_empty() {
            Some("abstract")
        } else if self.reference.trim().is_empty() {
            Some("reference summary")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_document() {
        let doc = Document::new(0, "An abstract.", "A summary.");
        assert!(doc.is_usable());
        assert_eq!(doc.missing_field(), None);
    }

    #[test]
    fn test_blank_fields_are_unusable() {
        let doc = Document::new(3, "  ", "A summary.");
        assert!(!doc.is_usable());
        assert_eq!(doc.missing_field(), Some("abstract"));

        let doc = Document::new(4, "Text", "");
        assert_eq!(doc.missing_field(), Some("reference summary"));
    }
}
