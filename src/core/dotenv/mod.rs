//! Dotenv documents.
//!
//! A [`Document`] is an ordered list of tagged lines. Every line keeps the
//! exact text it was parsed from, so untouched lines serialize back
//! byte-for-byte; only lines rewritten by [`Document::set`] are re-rendered.
//!
//! ```text
//! # comment                 -> Line::Comment
//!                           -> Line::Blank
//! export KEY="v" # note     -> Line::Entry { prefix: "export KEY=", raw_value: "\"v\"", suffix: " # note" }
//! ```

mod header;

pub use header::{HEADER_FINGERPRINT, HEADER_RECIPIENT, HEADER_VERSION};

use crate::core::validation::{validate_key, validate_value};
use crate::error::{DotenvError, Result};

/// Line terminator of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Lf,
    CrLf,
    /// Final line without a terminator.
    None,
}

impl Eol {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Eol::Lf => b"\n",
            Eol::CrLf => b"\r\n",
            Eol::None => b"",
        }
    }
}

/// How a value is quoted on its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    None,
    Single,
    Double,
}

/// A `KEY=VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: String,
    /// Everything before the value: indentation, `export `, key, `=`, spacing.
    prefix: String,
    /// The value as written, quotes included.
    raw_value: String,
    /// Everything after the value: spacing and the inline comment.
    suffix: String,
    quoting: Quoting,
    /// The decoded value.
    value: String,
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value as written on the line, quotes included.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// The value with quoting and escapes removed.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn quoting(&self) -> Quoting {
        self.quoting
    }

    /// Inline comment text starting at `#`, if any.
    pub fn trailing_comment(&self) -> Option<&str> {
        let trimmed = self.suffix.trim_start();
        if trimmed.starts_with('#') {
            Some(trimmed)
        } else {
            None
        }
    }

    fn text(&self) -> String {
        format!("{}{}{}", self.prefix, self.raw_value, self.suffix)
    }
}

/// One classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank { raw: String, eol: Eol },
    /// Comment bytes pass through untouched, valid UTF-8 or not.
    Comment { raw: Vec<u8>, eol: Eol },
    Entry { entry: Entry, eol: Eol },
    /// Text that is neither a comment nor an assignment, kept verbatim.
    Verbatim { raw: String, eol: Eol },
}

impl Line {
    fn eol(&self) -> Eol {
        match self {
            Line::Blank { eol, .. }
            | Line::Comment { eol, .. }
            | Line::Entry { eol, .. }
            | Line::Verbatim { eol, .. } => *eol,
        }
    }

    fn set_eol(&mut self, new: Eol) {
        match self {
            Line::Blank { eol, .. }
            | Line::Comment { eol, .. }
            | Line::Entry { eol, .. }
            | Line::Verbatim { eol, .. } => *eol = new,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Line::Blank { .. })
    }

    fn entry(&self) -> Option<&Entry> {
        match self {
            Line::Entry { entry, .. } => Some(entry),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Line::Blank { raw, .. } | Line::Verbatim { raw, .. } => {
                out.extend_from_slice(raw.as_bytes())
            }
            Line::Comment { raw, .. } => out.extend_from_slice(raw),
            Line::Entry { entry, .. } => out.extend_from_slice(entry.text().as_bytes()),
        }
        out.extend_from_slice(self.eol().as_bytes());
    }
}

/// Options for [`Document::set`].
#[derive(Debug, Clone, Copy)]
pub struct SetOptions {
    /// Always double-quote the value.
    pub force_quote: bool,
    /// Keep the inline comment of an existing entry.
    pub preserve_comment: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            force_quote: false,
            preserve_comment: true,
        }
    }
}

/// A parsed dotenv document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<Line>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document, preserving every byte of untouched lines.
    ///
    /// # Errors
    ///
    /// Fails on embedded NUL bytes, on an unterminated double-quoted value,
    /// or on invalid UTF-8 outside comments.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut lines = Vec::new();
        let mut rest = bytes;
        let mut number = 0;

        while !rest.is_empty() {
            number += 1;
            let (mut text, eol, next) = match rest.iter().position(|&b| b == b'\n') {
                Some(idx) => (&rest[..idx], Eol::Lf, &rest[idx + 1..]),
                None => (rest, Eol::None, &rest[rest.len()..]),
            };
            let mut eol = eol;
            if eol == Eol::Lf && text.last() == Some(&b'\r') {
                text = &text[..text.len() - 1];
                eol = Eol::CrLf;
            }
            rest = next;

            if text.contains(&0) {
                return Err(DotenvError::EmbeddedNul { line: number }.into());
            }
            lines.push(parse_line(text, eol, number)?);
        }

        Ok(Self { lines })
    }

    /// Serialize the document.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            line.write_to(&mut out);
        }
        out
    }

    /// Raw value of the last entry for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.find_last(key).map(|e| e.raw_value())
    }

    /// Decoded value of the last entry for `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.find_last(key).map(|e| e.value())
    }

    /// All entries, one per key, in document order of their last occurrence.
    pub fn entries(&self) -> Vec<&Entry> {
        let mut out: Vec<&Entry> = Vec::new();
        for entry in self.lines.iter().filter_map(Line::entry) {
            out.retain(|e| e.key != entry.key);
            out.push(entry);
        }
        out
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.entry().is_none())
    }

    /// Upsert `key`. Rewrites the last existing entry in place, otherwise
    /// appends. Returns whether the serialized document changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` or `InvalidValue`.
    pub fn set(&mut self, key: &str, value: &str, opts: SetOptions) -> Result<bool> {
        validate_key(key)?;
        validate_value(key, value)?;

        let (quoting, raw_value) = render_value(value, opts.force_quote);

        let last = self
            .lines
            .iter()
            .rposition(|l| l.entry().is_some_and(|e| e.key == key));

        if let Some(idx) = last {
            if let Line::Entry { entry, .. } = &mut self.lines[idx] {
                let suffix = if opts.preserve_comment {
                    entry.suffix.clone()
                } else {
                    String::new()
                };
                let updated = Entry {
                    key: key.to_string(),
                    prefix: entry.prefix.clone(),
                    raw_value,
                    suffix,
                    quoting,
                    value: value.to_string(),
                };
                if *entry == updated {
                    return Ok(false);
                }
                *entry = updated;
            }
            return Ok(true);
        }

        let eol = self.default_eol();
        if let Some(tail) = self.lines.last_mut() {
            if tail.eol() == Eol::None {
                tail.set_eol(eol);
            }
        }
        self.lines.push(Line::Entry {
            entry: Entry {
                key: key.to_string(),
                prefix: format!("{}=", key),
                raw_value,
                suffix: String::new(),
                quoting,
                value: value.to_string(),
            },
            eol,
        });
        Ok(true)
    }

    /// Remove every entry for `key`, inline comments included. When the
    /// removal leaves two blank lines adjacent, one of them goes too.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey`.
    pub fn unset(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let mut changed = false;
        let mut idx = 0;
        while idx < self.lines.len() {
            if !self.lines[idx].entry().is_some_and(|e| e.key == key) {
                idx += 1;
                continue;
            }
            let removed = self.lines.remove(idx);
            changed = true;

            if idx > 0
                && idx < self.lines.len()
                && self.lines[idx - 1].is_blank()
                && self.lines[idx].is_blank()
            {
                self.lines.remove(idx);
            }
            if idx == self.lines.len() && removed.eol() == Eol::None {
                if let Some(tail) = self.lines.last_mut() {
                    tail.set_eol(Eol::None);
                }
            }
        }
        Ok(changed)
    }

    /// Lines in order.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    fn find_last(&self, key: &str) -> Option<&Entry> {
        self.lines
            .iter()
            .rev()
            .filter_map(Line::entry)
            .find(|e| e.key == key)
    }

    fn default_eol(&self) -> Eol {
        self.lines
            .iter()
            .map(Line::eol)
            .find(|e| *e != Eol::None)
            .unwrap_or(Eol::Lf)
    }
}

fn parse_line(text: &[u8], eol: Eol, number: usize) -> Result<Line> {
    let first = text.iter().position(|b| *b != b' ' && *b != b'\t');
    match first {
        None => {
            let raw = String::from_utf8(text.to_vec())
                .map_err(|_| DotenvError::InvalidUtf8 { line: number })?;
            return Ok(Line::Blank { raw, eol });
        }
        Some(i) if text[i] == b'#' => {
            return Ok(Line::Comment {
                raw: text.to_vec(),
                eol,
            })
        }
        Some(_) => {}
    }

    let raw =
        String::from_utf8(text.to_vec()).map_err(|_| DotenvError::InvalidUtf8 { line: number })?;

    match parse_assignment(&raw, number)? {
        Some(entry) => Ok(Line::Entry { entry, eol }),
        None => Ok(Line::Verbatim { raw, eol }),
    }
}

fn parse_assignment(line: &str, number: usize) -> Result<Option<Entry>> {
    let Some(eq) = line.find('=') else {
        return Ok(None);
    };
    let left = &line[..eq];
    let mut key_part = left.trim();
    if let Some(rest) = key_part
        .strip_prefix("export ")
        .or_else(|| key_part.strip_prefix("export\t"))
    {
        key_part = rest.trim();
    }
    if !is_plausible_key(key_part) {
        return Ok(None);
    }
    let key = key_part.to_string();

    let right = &line[eq + 1..];
    let ws = right.len() - right.trim_start_matches([' ', '\t']).len();
    let prefix = line[..eq + 1 + ws].to_string();
    let body = &right[ws..];

    let (raw_value, suffix, quoting, value) = match body.chars().next() {
        Some('"') => {
            let end = find_closing_double(body)
                .ok_or(DotenvError::UnterminatedQuote { line: number })?;
            let raw = &body[..=end];
            (
                raw,
                &body[end + 1..],
                Quoting::Double,
                unescape_double(&raw[1..raw.len() - 1]),
            )
        }
        Some('\'') => match body[1..].find('\'') {
            Some(end) => {
                let raw = &body[..end + 2];
                (
                    raw,
                    &body[end + 2..],
                    Quoting::Single,
                    raw[1..raw.len() - 1].to_string(),
                )
            }
            None => (body, "", Quoting::None, body.trim_end().to_string()),
        },
        _ => {
            let cut = find_inline_comment(body).unwrap_or(body.len());
            let raw = body[..cut].trim_end_matches([' ', '\t']);
            (raw, &body[raw.len()..], Quoting::None, raw.to_string())
        }
    };

    Ok(Some(Entry {
        key,
        prefix,
        raw_value: raw_value.to_string(),
        suffix: suffix.to_string(),
        quoting,
        value,
    }))
}

fn is_plausible_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn find_closing_double(body: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in body.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// `#` starts a comment only at the beginning or after whitespace.
fn find_inline_comment(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    bytes.iter().enumerate().find_map(|(i, b)| {
        let after_ws = i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t';
        (*b == b'#' && after_ws).then_some(i)
    })
}

fn unescape_double(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn is_bare_safe(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '@' | ':' | '+' | '-')
        })
}

/// Minimal quoting: bare when safe, otherwise double-quoted.
fn render_value(value: &str, force_quote: bool) -> (Quoting, String) {
    if !force_quote && is_bare_safe(value) {
        return (Quoting::None, value.to_string());
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    (Quoting::Double, out)
}
