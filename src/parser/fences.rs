/// A front-matter block found at the very start of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fenced<'a> {
    /// Everything removed from the note: both fences, the YAML in between,
    /// and at most one blank line after the closing fence.
    pub raw: &'a str,
    /// The YAML between the fences, without the fence lines.
    pub yaml: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub block: Option<Fenced<'a>>,
    pub body: &'a str,
}

impl Split<'_> {
    pub fn has_front_matter(&self) -> bool {
        self.block.is_some()
    }
}

/// Split a note into its front-matter block and body.
///
/// The first line must be exactly `---`; the block runs until the next line
/// that is exactly `---`. A closing fence at end of text counts. Without a
/// closing fence the note has no front matter and the body is the whole text.
/// `block.raw` followed by `body` always reproduces the input.
pub fn split(text: &str) -> Split<'_> {
    let none = Split {
        block: None,
        body: text,
    };

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return none;
    };
    if !is_fence(first) {
        return none;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if is_fence(line) {
            let yaml = &text[yaml_start..offset];
            let mut end = offset + line.len();

            // one trailing blank line belongs to the block
            if let Some(next) = text[end..].split_inclusive('\n').next() {
                if next.ends_with('\n') && next.trim().is_empty() {
                    end += next.len();
                }
            }

            return Split {
                block: Some(Fenced {
                    raw: &text[..end],
                    yaml: strip_line_ending(yaml),
                }),
                body: &text[end..],
            };
        }
        offset += line.len();
    }

    none
}

fn is_fence(line: &str) -> bool {
    strip_line_ending(line) == "---"
}

fn strip_line_ending(s: &str) -> &str {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_block() {
        let s = split("---\ntags: [x, y]\n---\nHello World");
        let block = s.block.unwrap();
        assert_eq!(block.yaml, "tags: [x, y]");
        assert_eq!(block.raw, "---\ntags: [x, y]\n---\n");
        assert_eq!(s.body, "Hello World");
    }

    #[test]
    fn closing_fence_at_end_of_text() {
        let s = split("---\ntitle: x\n---");
        assert_eq!(s.block.unwrap().yaml, "title: x");
        assert_eq!(s.body, "");
    }

    #[test]
    fn blank_line_after_fence_is_consumed_once() {
        let s = split("---\na: 1\n---\n\n\nBody");
        assert_eq!(s.block.unwrap().raw, "---\na: 1\n---\n\n");
        assert_eq!(s.body, "\nBody");
    }

    #[test]
    fn empty_block() {
        let s = split("---\n---\nBody");
        let block = s.block.unwrap();
        assert_eq!(block.yaml, "");
        assert_eq!(s.body, "Body");
    }

    #[test]
    fn multiline_yaml() {
        let s = split("---\ntitle: A\ntags:\n  - x\n  - y\n---\n# Heading\n");
        assert_eq!(s.block.unwrap().yaml, "title: A\ntags:\n  - x\n  - y");
        assert_eq!(s.body, "# Heading\n");
    }

    #[test]
    fn crlf_line_endings() {
        let s = split("---\r\na: 1\r\n---\r\nBody");
        let block = s.block.unwrap();
        assert_eq!(block.yaml, "a: 1");
        assert_eq!(s.body, "Body");
    }

    #[test]
    fn fence_not_at_start() {
        let text = "Intro\n---\na: 1\n---\nBody";
        let s = split(text);
        assert!(!s.has_front_matter());
        assert_eq!(s.body, text);
    }

    #[test]
    fn leading_whitespace_is_not_a_fence() {
        assert!(!split(" ---\na: 1\n---\n").has_front_matter());
        assert!(!split("\n---\na: 1\n---\n").has_front_matter());
    }

    #[test]
    fn unclosed_fence() {
        let text = "---\na: 1\nno closing fence";
        let s = split(text);
        assert!(!s.has_front_matter());
        assert_eq!(s.body, text);
    }

    #[test]
    fn longer_dash_runs_are_not_fences() {
        assert!(!split("----\na: 1\n----\n").has_front_matter());
        let s = split("---\na: 1\n-----\n---\nBody");
        assert_eq!(s.block.unwrap().yaml, "a: 1\n-----");
    }

    #[test]
    fn horizontal_rule_in_body_is_kept() {
        let s = split("---\na: 1\n---\nabove\n---\nbelow");
        assert_eq!(s.body, "above\n---\nbelow");
    }

    #[test]
    fn empty_text() {
        let s = split("");
        assert!(!s.has_front_matter());
        assert_eq!(s.body, "");
    }

    proptest! {
        #[test]
        fn prop_raw_plus_body_reconstructs(
            yaml in "[a-z: \\n]{0,40}",
            body in "[A-Za-z0-9 .,\\n-]{0,80}",
        ) {
            let text = format!("---\n{}\n---\n{}", yaml, body);
            let s = split(&text);
            let reconstructed = format!("{}{}", s.block.map(|b| b.raw).unwrap_or(""), s.body);
            prop_assert_eq!(reconstructed, text);
        }

        #[test]
        fn prop_strip_is_idempotent(
            yaml in "[a-z: ]{0,20}",
            body in "[A-Za-z0-9 .,]{1,80}",
        ) {
            let text = format!("---\n{}\n---\n{}", yaml, body);
            let once = split(&text).body;
            let twice = split(once);
            prop_assert!(!twice.has_front_matter());
            prop_assert_eq!(twice.body, once);
        }
    }
}
