//! The `# si-vault:` header block.
//!
//! Vault documents rendered by `si vault dump` start with a reserved comment
//! block naming the schema version, every recipient, and the fingerprint
//! of the recipient set.

use super::{Document, Eol, Line};
use crate::core::trust;

pub const HEADER_VERSION: &str = "# si-vault:v1";
pub const HEADER_RECIPIENT: &str = "# si-vault:recipient ";
pub const HEADER_FINGERPRINT: &str = "# si-vault:fingerprint ";

const HEADER_MARK: &str = "# si-vault:";

impl Document {
    /// Insert or rewrite the header block for `recipients`.
    ///
    /// Returns `false` and leaves the document untouched when the block is
    /// already canonical.
    pub fn ensure_header(&mut self, recipients: &[String]) -> bool {
        let eol = self.default_eol();
        let recipients = trust::canonical(recipients);

        let mut block: Vec<Line> = Vec::with_capacity(recipients.len() + 3);
        block.push(comment(HEADER_VERSION.to_string(), eol));
        for r in &recipients {
            block.push(comment(format!("{}{}", HEADER_RECIPIENT, r), eol));
        }
        block.push(comment(
            format!("{}{}", HEADER_FINGERPRINT, trust::fingerprint(&recipients)),
            eol,
        ));

        let existing = self.header_len();
        let separator = self.lines.get(existing).is_some_and(Line::is_blank);
        let body_follows = self.lines.len() > existing + usize::from(separator);

        if body_follows || separator {
            block.push(Line::Blank {
                raw: String::new(),
                eol,
            });
        }

        let cut = existing + usize::from(existing > 0 && separator);
        if self.lines[..cut] == block[..] {
            return false;
        }
        self.lines.splice(..cut, block);
        true
    }

    /// Recipients named in the header block.
    pub fn header_recipients(&self) -> Vec<String> {
        self.lines[..self.header_len()]
            .iter()
            .filter_map(comment_text)
            .filter_map(|t| t.strip_prefix(HEADER_RECIPIENT).map(|r| r.trim().to_string()))
            .filter(|r| !r.is_empty())
            .collect()
    }

    /// Fingerprint recorded in the header block, if any.
    pub fn header_fingerprint(&self) -> Option<String> {
        self.lines[..self.header_len()]
            .iter()
            .filter_map(comment_text)
            .find_map(|t| {
                t.strip_prefix(HEADER_FINGERPRINT)
                    .map(|f| f.trim().to_string())
            })
    }

    fn header_len(&self) -> usize {
        self.lines
            .iter()
            .take_while(|l| comment_text(l).is_some_and(|t| t.starts_with(HEADER_MARK)))
            .count()
    }
}

fn comment(text: String, eol: Eol) -> Line {
    Line::Comment {
        raw: text.into_bytes(),
        eol,
    }
}

fn comment_text(line: &Line) -> Option<&str> {
    match line {
        Line::Comment { raw, .. } => std::str::from_utf8(raw).ok().map(str::trim),
        _ => None,
    }
}
