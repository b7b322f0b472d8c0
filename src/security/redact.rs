//! Literal secret redaction over text and result trees.
//!
//! Each occurrence of a known secret value becomes `[REDACTED:<NAME>]`.
//! Markers already naming a known secret are copied through untouched and a
//! match never extends into one, so running the pass twice changes nothing.

use crate::sandbox::Value;
use indexmap::IndexMap;
use std::borrow::Cow;

const MARKER_PREFIX: &str = "[REDACTED:";

/// Values shorter than this are never redacted.
pub const MIN_SECRET_LEN: usize = 8;

pub fn marker(name: &str) -> String {
    format!("{MARKER_PREFIX}{name}]")
}

/// Borrowed view over a secret set, built once per redaction pass.
#[derive(Debug)]
pub struct Redactor<'a> {
    /// `(name, value)`, longest value first so the first hit is the longest.
    candidates: Vec<(&'a str, &'a str)>,
    names: Vec<&'a str>,
}

impl<'a> Redactor<'a> {
    pub fn new(secrets: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut candidates = Vec::new();
        let mut names = Vec::new();
        for (name, value) in secrets {
            names.push(name);
            if value.chars().count() >= MIN_SECRET_LEN {
                candidates.push((name, value));
            }
        }
        candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));
        Self { candidates, names }
    }

    /// Redact `text`, borrowing it back unchanged when no secret occurs.
    pub fn text<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if !self
            .candidates
            .iter()
            .any(|(_, value)| text.contains(value))
        {
            return Cow::Borrowed(text);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some((start, end)) = self.next_marker(rest) {
            self.redact_segment(&rest[..start], &mut out);
            out.push_str(&rest[start..end]);
            rest = &rest[end..];
        }
        self.redact_segment(rest, &mut out);
        Cow::Owned(out)
    }

    /// Walk strings, lists, and maps (keys included). Other scalars pass through.
    ///
    /// A key that redacts to one already present gets a `#2`, `#3`, ... suffix,
    /// so no entry is dropped.
    pub fn value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => {
                let redacted = match self.text(&s) {
                    Cow::Owned(r) => Some(r),
                    Cow::Borrowed(_) => None,
                };
                Value::String(redacted.unwrap_or(s))
            }
            Value::List(items) => Value::List(items.into_iter().map(|v| self.value(v)).collect()),
            Value::Map(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    let key = unique_key(&out, self.text(&key).into_owned());
                    out.insert(key, self.value(item));
                }
                Value::Map(out)
            }
            scalar => scalar,
        }
    }

    fn is_known(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    /// Byte range of the next marker that names a known secret.
    fn next_marker(&self, text: &str) -> Option<(usize, usize)> {
        let mut offset = 0;
        while let Some(found) = text[offset..].find(MARKER_PREFIX) {
            let start = offset + found;
            let name_start = start + MARKER_PREFIX.len();
            if let Some(close) = text[name_start..].find(']') {
                if self.is_known(&text[name_start..name_start + close]) {
                    return Some((start, name_start + close + 1));
                }
            }
            offset = start + 1;
        }
        None
    }

    fn redact_segment(&self, segment: &str, out: &mut String) {
        let mut index = 0;
        while let Some(rest) = segment.get(index..) {
            let Some(ch) = rest.chars().next() else {
                break;
            };
            match self
                .candidates
                .iter()
                .find(|(_, value)| rest.starts_with(value))
            {
                Some((name, value)) => {
                    out.push_str(&marker(name));
                    index += value.len();
                }
                None => {
                    out.push(ch);
                    index += ch.len_utf8();
                }
            }
        }
    }
}

fn unique_key(taken: &IndexMap<String, Value>, key: String) -> String {
    if !taken.contains_key(&key) {
        return key;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{key}#{n}");
        if !taken.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
