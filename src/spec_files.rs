//! Readers for the two small text inputs: the inspection-spec file (which
//! signals to track) and the extraction-spec file (timestamped snapshot
//! requests). Grounded in `original_source/.../main.cc`'s `SetupParser`,
//! reimplemented without a regex engine since the patterns involved are
//! simple cursor scans.

use std::collections::HashSet;

use crate::cursor::Cursor;
use crate::error::{malformed, Error};
use crate::extraction::ExtractionRequest;
use crate::identifier::IdentifierCode;

/// Which signals the header parser should track. An empty spec means "track
/// everything".
#[derive(Debug, Clone, Default)]
pub struct InspectionSpec {
    paths: HashSet<String>,
}

impl InspectionSpec {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

/// Scans `text` for every double-quoted substring and collects it verbatim,
/// including any embedded `->` scope separators. Mirrors the original's
/// `"(.*?)"` regex scan.
#[must_use]
pub fn read_inspection_spec(text: &[u8]) -> InspectionSpec {
    let mut paths = HashSet::new();
    let mut cursor = Cursor::new(text);
    while !cursor.is_at_end() {
        if cursor.try_consume(b"\"") {
            match cursor.take_until(b"\"") {
                Ok(inner) => {
                    paths.insert(String::from_utf8_lossy(&inner).into_owned());
                    cursor.try_consume(b"\"");
                }
                Err(_) => break,
            }
        } else {
            cursor.read_byte();
        }
    }
    InspectionSpec { paths }
}

/// Declarations (`$var ... $end` substrings) seen so far in a batch, shared
/// across files so the header parser can validate cross-file consistency.
/// This is an explicit, caller-owned handle rather than process-global
/// state: create one per batch, thread it by `&mut` through every
/// `parse_one` call, drop it when the batch is done.
#[derive(Debug, Clone, Default)]
pub struct VarDefSet {
    declarations: HashSet<String>,
}

impl VarDefSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if this is the first file to declare anything — the header
    /// parser uses this to decide whether to insert or merely validate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn insert(&mut self, declaration: String) {
        self.declarations.insert(declaration);
    }

    #[must_use]
    pub fn contains(&self, declaration: &str) -> bool {
        self.declarations.contains(declaration)
    }
}

/// Parses one request per line: a decimal timestamp (with `strtoul(...,0)`
/// base detection — `0x`/`0X` prefix is hex, a bare leading `0` followed by
/// more digits is octal, otherwise decimal), followed by whitespace-
/// separated identifier codes. `index` is the 0-based line number. A line
/// consisting of only whitespace terminates parsing.
pub fn read_extraction_spec(text: &[u8]) -> Result<Vec<ExtractionRequest>, Error> {
    let mut requests = Vec::new();
    for (index, line) in text.split(|&b| b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        let mut fields = line
            .split(|b: &u8| b.is_ascii_whitespace())
            .filter(|f| !f.is_empty());

        let time_field = fields
            .next()
            .ok_or_else(|| malformed(0, "extraction spec line has no timestamp"))?;
        let time_text = std::str::from_utf8(time_field)
            .map_err(|_| malformed(0, "extraction spec timestamp is not valid UTF-8"))?;
        let time = parse_c_style_integer(time_text)
            .ok_or_else(|| malformed(0, format!("invalid extraction timestamp `{time_text}`")))?;

        let ids = fields
            .map(IdentifierCode::encode)
            .collect::<Result<Vec<_>, _>>()?;

        requests.push(ExtractionRequest { time, ids, index });
    }
    Ok(requests)
}

/// `strtoul(s, NULL, 0)`-style base detection: `0x`/`0X` prefix selects hex,
/// a bare leading `0` followed by more digits selects octal, otherwise
/// decimal.
fn parse_c_style_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}
