pub mod fences;
pub mod front_matter;

use crate::corpus::Document;
use front_matter::FrontMatter;

/// A note split into metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// `None` when the note has no fences; `Some(empty)` when the fenced
    /// block was empty or could not be parsed.
    pub front_matter: Option<FrontMatter>,
    /// Text with the fenced block removed, or the full text without one.
    pub body: String,
}

/// Two-pass extraction: text → fenced block → parsed mapping.
pub fn extract(doc: &Document) -> Extracted {
    let split = fences::split(&doc.text);
    Extracted {
        front_matter: split.block.map(|b| front_matter::parse(b.yaml)),
        body: split.body.to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn doc(text: &str) -> Document {
        Document {
            directory: PathBuf::new(),
            name: "n".into(),
            extension: "md".into(),
            text: text.into(),
        }
    }

    #[test]
    fn with_front_matter() {
        let e = extract(&doc("---\ntags: [x, y]\n---\nHello World"));
        assert_eq!(e.front_matter.unwrap().len(), 1);
        assert_eq!(e.body, "Hello World");
    }

    #[test]
    fn without_front_matter() {
        let e = extract(&doc("Just text"));
        assert!(e.front_matter.is_none());
        assert_eq!(e.body, "Just text");
    }

    #[test]
    fn malformed_front_matter_still_strips() {
        let e = extract(&doc("---\ntags: [x, y\n---\nBody"));
        assert_eq!(e.front_matter, Some(FrontMatter::new()));
        assert_eq!(e.body, "Body");
    }
}
