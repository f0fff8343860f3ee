pub mod stopwords;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::table::{CorpusTable, Value};
use stopwords::Language;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

static PATH_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/\\]").unwrap());
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Per-cell cleaner: path separators to spaces, lowercase, strip
/// punctuation, drop stop words. Holds no cross-row state.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    stop_words: HashSet<&'static str>,
}

impl TextNormalizer {
    pub fn new(languages: &[Language]) -> Self {
        let stop_words = languages.iter().flat_map(|l| l.words().iter().copied()).collect();
        Self { stop_words }
    }

    pub fn normalize(&self, text: &str) -> String {
        let spaced = PATH_SEP_RE.replace_all(text, " ");
        let lower = spaced.to_lowercase();
        let stripped = PUNCT_RE.replace_all(&lower, "");
        stripped
            .split_whitespace()
            .filter(|token| !self.stop_words.contains(*token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Normalize the named text columns in place. Non-text cells are left alone.
pub fn normalize_columns(table: &mut CorpusTable, columns: &[String], normalizer: &TextNormalizer) {
    for name in columns {
        let Some(column) = table.column_mut(name) else {
            debug!(column = %name, "no such column, nothing to normalize");
            continue;
        };
        let mut cells: Vec<&mut String> = column
            .values
            .iter_mut()
            .filter_map(|v| match v {
                Value::Text(s) => Some(s),
                _ => None,
            })
            .collect();
        if cells.is_empty() {
            warn!(column = %name, "column holds no text");
            continue;
        }
        normalize_cells(&mut cells, normalizer);
    }
}

#[cfg(feature = "rayon")]
fn normalize_cells(cells: &mut [&mut String], normalizer: &TextNormalizer) {
    cells.par_iter_mut().for_each(|s| {
        let cleaned = normalizer.normalize(s.as_str());
        **s = cleaned;
    });
}

#[cfg(not(feature = "rayon"))]
fn normalize_cells(cells: &mut [&mut String], normalizer: &TextNormalizer) {
    cells.iter_mut().for_each(|s| {
        let cleaned = normalizer.normalize(s.as_str());
        **s = cleaned;
    });
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnKind};
    use proptest::prelude::*;

    fn both() -> TextNormalizer {
        TextNormalizer::new(&[Language::English, Language::German])
    }

    #[test]
    fn lowercase_and_punctuation() {
        let n = TextNormalizer::new(&[]);
        assert_eq!(n.normalize("Hello, World!"), "hello world");
        assert_eq!(n.normalize("C++ & Rust's traits."), "c rusts traits");
    }

    #[test]
    fn slashes_split_path_segments() {
        let n = TextNormalizer::new(&[]);
        assert_eq!(n.normalize("Projects/Rust/notes"), "projects rust notes");
        assert_eq!(n.normalize(r"Area\Sub"), "area sub");
    }

    #[test]
    fn english_and_german_stop_words() {
        let n = both();
        assert_eq!(n.normalize("The cat and the dog"), "cat dog");
        // "hat" is a German stop word
        assert_eq!(n.normalize("The cat and the hat"), "cat");
        assert_eq!(n.normalize("Der Hund und die Katze"), "hund katze");
        assert_eq!(n.normalize("Über den Wolken, für immer"), "wolken immer");
        assert_eq!(n.normalize("Don't stop"), "stop");
    }

    #[test]
    fn single_language() {
        let n = TextNormalizer::new(&[Language::English]);
        assert_eq!(n.normalize("the und"), "und");
    }

    #[test]
    fn keeps_underscores_digits_and_umlauts() {
        let n = both();
        assert_eq!(n.normalize("snake_case 2024 Größe"), "snake_case 2024 größe");
    }

    #[test]
    fn whitespace_collapses() {
        let n = TextNormalizer::new(&[]);
        assert_eq!(n.normalize("  a\n\n b\t c  "), "a b c");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn columns_in_place() {
        let mut t = CorpusTable::new(2);
        t.push(Column {
            name: "text".into(),
            kind: ColumnKind::Text,
            values: vec![Value::Text("The Quick fox!".into()), Value::Text("a/b".into())],
        });
        t.push(Column {
            name: "rating".into(),
            kind: ColumnKind::Numeric,
            values: vec![Value::Number(1.0), Value::Number(2.0)],
        });
        normalize_columns(&mut t, &["text".into(), "rating".into(), "absent".into()], &both());
        assert_eq!(t.text("text", 0), Some("quick fox"));
        assert_eq!(t.text("text", 1), Some("b"));
        assert_eq!(t.value("rating", 0), Some(&Value::Number(1.0)));
    }

    proptest! {
        #[test]
        fn prop_idempotent(s in "[a-zA-Z0-9 ./,!?'_äöüÄÖÜß\\n-]{0,80}") {
            let n = both();
            let once = n.normalize(&s);
            let twice = n.normalize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
