//! Opaque pagination cursors.
//!
//! A cursor is five newline-separated fields, base64url-encoded without
//! padding:
//!
//! ```text
//! p=<prefix>
//! q=<keyword>
//! n=<count>
//! o=<offset>
//! k=<last key>
//! ```
//!
//! Optional fields use `-` in place of `=` when absent, so `p=` (empty
//! prefix) and `p-` (no prefix) stay distinct. Backslashes and newlines
//! inside values are escaped.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub prefix: Option<String>,
    pub keyword: Option<String>,
    pub count: usize,
    pub offset: usize,
    /// Key of the last item on the previous page.
    pub last_key: Option<String>,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let mut text = String::new();
        push_optional(&mut text, 'p', self.prefix.as_deref());
        text.push('\n');
        push_optional(&mut text, 'q', self.keyword.as_deref());
        text.push('\n');
        text.push_str(&format!("n={}\no={}\n", self.count, self.offset));
        push_optional(&mut text, 'k', self.last_key.as_deref());
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|e| malformed(format!("invalid base64: {e}")))?;
        let text = String::from_utf8(bytes).map_err(|_| malformed("not UTF-8"))?;

        let lines: Vec<&str> = text.split('\n').collect();
        let [prefix, keyword, count, offset, last_key] = lines.as_slice() else {
            return Err(malformed(format!("expected 5 fields, found {}", lines.len())));
        };

        Ok(Self {
            prefix: parse_optional(prefix, 'p')?,
            keyword: parse_optional(keyword, 'q')?,
            count: parse_number(count, 'n')?,
            offset: parse_number(offset, 'o')?,
            last_key: parse_optional(last_key, 'k')?,
        })
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedCursor(reason.into())
}

fn push_optional(out: &mut String, tag: char, value: Option<&str>) {
    out.push(tag);
    match value {
        None => out.push('-'),
        Some(value) => {
            out.push('=');
            for c in value.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    c => out.push(c),
                }
            }
        }
    }
}

fn parse_optional(line: &str, tag: char) -> Result<Option<String>> {
    let rest = line
        .strip_prefix(tag)
        .ok_or_else(|| malformed(format!("missing field '{tag}'")))?;

    if rest == "-" {
        return Ok(None);
    }
    let escaped = rest
        .strip_prefix('=')
        .ok_or_else(|| malformed(format!("bad marker for field '{tag}'")))?;

    let mut value = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => value.push('\\'),
            Some('n') => value.push('\n'),
            _ => return Err(malformed(format!("bad escape in field '{tag}'"))),
        }
    }
    Ok(Some(value))
}

fn parse_number(line: &str, tag: char) -> Result<usize> {
    line.strip_prefix(tag)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or_else(|| malformed(format!("missing field '{tag}'")))?
        .parse()
        .map_err(|_| malformed(format!("field '{tag}' is not a number")))
}
