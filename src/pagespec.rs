//! Page-spec parsing: which pages hold tables, and which pages belong together.
//!
//! Batch records list their table pages in a compact notation:
//!
//! ```text
//! 10,(160,161),345,(348,349,350)
//! ```
//!
//! A bare number is a single-page table; a parenthesized list is one table
//! that continues across those pages, in the written order. That order is
//! load-bearing — it decides the row order of the merged table downstream,
//! so it is never resorted here.
//!
//! Duplicate page numbers anywhere in the spec are rejected: the same
//! physical page cannot belong to two logical tables, and in practice a
//! repeat means a typo in the sidecar file.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One logical table's page membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageUnit {
    /// A table contained on a single page (1-indexed).
    Single(u32),
    /// A table continuing across multiple pages, in declared order.
    Group(Vec<u32>),
}

impl PageUnit {
    /// The unit's pages in declared order.
    pub fn pages(&self) -> &[u32] {
        match self {
            PageUnit::Single(p) => std::slice::from_ref(p),
            PageUnit::Group(ps) => ps,
        }
    }

    /// Compact page reference used in record identifiers: `"10"` for a
    /// single page, `"160-161"` (first-last) for a group.
    pub fn page_ref(&self) -> String {
        match self {
            PageUnit::Single(p) => p.to_string(),
            PageUnit::Group(ps) => format!("{}-{}", ps[0], ps[ps.len() - 1]),
        }
    }
}

impl fmt::Display for PageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageUnit::Single(p) => write!(f, "{p}"),
            PageUnit::Group(ps) => {
                write!(f, "(")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a page-spec string into an ordered sequence of [`PageUnit`]s.
///
/// Whitespace around tokens is insignificant. Fails with
/// [`ExtractError::MalformedPageSpec`] on: non-numeric tokens, empty groups,
/// nested parentheses, unbalanced parentheses, page number zero, a repeated
/// page number anywhere in the spec, or an empty spec.
pub fn parse_page_spec(spec: &str) -> Result<Vec<PageUnit>, ExtractError> {
    let malformed = |detail: String| ExtractError::MalformedPageSpec {
        spec: spec.to_string(),
        detail,
    };

    let mut units = Vec::new();
    let mut seen: HashSet<u32> = HashSet::new();

    for token in split_top_level(spec).map_err(&malformed)? {
        let token = token.trim();
        if token.is_empty() {
            return Err(malformed("empty token".into()));
        }

        if let Some(inner) = token.strip_prefix('(') {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| malformed(format!("unclosed group '{token}'")))?;
            if inner.contains('(') || inner.contains(')') {
                return Err(malformed("nested groups are not allowed".into()));
            }
            if inner.trim().is_empty() {
                return Err(malformed("empty group".into()));
            }
            let pages: Vec<u32> = inner
                .split(',')
                .map(|n| parse_page_number(n).map_err(&malformed))
                .collect::<Result<_, _>>()?;
            for &p in &pages {
                if !seen.insert(p) {
                    return Err(malformed(format!("page {p} appears more than once")));
                }
            }
            units.push(PageUnit::Group(pages));
        } else {
            let p = parse_page_number(token).map_err(&malformed)?;
            if !seen.insert(p) {
                return Err(malformed(format!("page {p} appears more than once")));
            }
            units.push(PageUnit::Single(p));
        }
    }

    if units.is_empty() {
        return Err(malformed("spec contains no page units".into()));
    }
    Ok(units)
}

/// Render a unit sequence back to its normalized spec string.
///
/// `format_page_spec(&parse_page_spec(s)?)` reparses to the same sequence;
/// the normalized form drops insignificant whitespace.
pub fn format_page_spec(units: &[PageUnit]) -> String {
    units
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Join the non-comment lines of a sidecar page-spec file into one spec
/// string. Blank lines and lines starting with `#` are ignored.
///
/// File I/O stays at the CLI edge; this only transforms the text.
pub fn spec_from_sidecar_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_page_number(token: &str) -> Result<u32, String> {
    let token = token.trim();
    match token.parse::<u32>() {
        Ok(0) => Err("page numbers are 1-indexed, got 0".into()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("invalid page number '{token}'")),
    }
}

/// Split on commas at parenthesis depth zero, validating balance and depth.
fn split_top_level(spec: &str) -> Result<Vec<&str>, String> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in spec.char_indices() {
        match c {
            '(' => {
                depth += 1;
                if depth > 1 {
                    return Err("nested groups are not allowed".into());
                }
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ')'".to_string())?;
            }
            ',' if depth == 0 => {
                tokens.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '('".into());
    }
    tokens.push(&spec[start..]);
    // A trailing empty slice from "10," is caught as an empty token upstream,
    // but a fully blank spec should report "no page units" instead.
    if tokens.len() == 1 && tokens[0].trim().is_empty() {
        tokens.clear();
    }
    Ok(tokens)
}
