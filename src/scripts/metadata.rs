use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub description: String,
    pub entries: BTreeMap<String, String>,
}

/// Parse `// @key: value` lines from the leading comment block.
///
/// `///` and `//!` are accepted as comment openers and blank lines inside the
/// block are skipped. Parsing stops at the first line of code. A bare `@flag`
/// stores an empty value; later duplicates overwrite earlier ones.
pub fn parse(source: &str) -> Metadata {
    let mut metadata = Metadata::default();

    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix("//") else {
            break;
        };
        let comment = comment
            .strip_prefix(['/', '!'])
            .unwrap_or(comment)
            .trim();
        let Some(tag) = comment.strip_prefix('@') else {
            continue;
        };

        let (key, value) = match tag.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (tag.trim(), ""),
        };
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }
        if key == "description" {
            metadata.description = value.to_string();
        } else {
            metadata.entries.insert(key.to_string(), value.to_string());
        }
    }

    metadata
}
