//! Key/value extraction from mmWave Studio Lua scripts.
//!
//! Studio scripts mix function calls, comments and plain `name = value`
//! assignments. Only the assignments carry the physical radar parameters we
//! care about, so the extractor does a single top-to-bottom pass and collects
//! every line of the form `ident = literal`, tolerating trailing `--` comments
//! and separators. Everything else is ignored. The policy is deliberately
//! forgiving: a malformed value skips that line, never the whole script.

use std::collections::BTreeMap;

/// A parsed Lua literal. Unit information is implied by the parameter name.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Literal {
    /// Numeric view of the literal, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(v) => Some(*v as f64),
            Literal::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Extract `ident = literal` assignments from a sequence of script lines.
///
/// Later assignments of the same identifier overwrite earlier ones, matching
/// the effect of executing the script top to bottom.
pub fn parse_assignments<I, S>(lines: I) -> BTreeMap<String, Literal>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = BTreeMap::new();
    for line in lines {
        if let Some((key, value)) = parse_line(line.as_ref()) {
            params.insert(key, value);
        }
    }
    params
}

/// Parse one line; `None` for anything that is not a well-formed assignment.
fn parse_line(line: &str) -> Option<(String, Literal)> {
    let rest = line.trim_start();
    let ident_len = ident_prefix_len(rest);
    if ident_len == 0 {
        return None;
    }
    let (ident, rest) = rest.split_at(ident_len);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=')?;
    // `==` is a comparison, not an assignment.
    if rest.starts_with('=') {
        return None;
    }

    // Cut at the Lua comment marker, then strip whitespace and one trailing
    // separator comma.
    let mut value = rest.split("--").next().unwrap_or("").trim();
    value = value.strip_suffix(',').unwrap_or(value).trim();

    let literal = parse_literal(value)?;
    Some((ident.to_string(), literal))
}

/// Length of the leading `[A-Za-z_][A-Za-z0-9_]*` identifier, 0 if absent.
fn ident_prefix_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    for (i, c) in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return i;
        }
    }
    s.len()
}

/// Best-effort literal parse: integer (decimal or `0x` hex), float, boolean,
/// or quoted string. Anything else is not a literal.
fn parse_literal(value: &str) -> Option<Literal> {
    if value.is_empty() {
        return None;
    }
    if let Some(s) = quoted(value) {
        return Some(Literal::Str(s.to_string()));
    }
    match value {
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        _ => {}
    }
    let (sign, digits) = match value.strip_prefix('-') {
        Some(d) => (-1i64, d),
        None => (1i64, value),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        if let Ok(v) = i64::from_str_radix(hex, 16) {
            return Some(Literal::Int(sign * v));
        }
        return None;
    }
    if let Ok(v) = value.parse::<i64>() {
        return Some(Literal::Int(v));
    }
    if let Ok(v) = value.parse::<f64>() {
        return Some(Literal::Float(v));
    }
    None
}

fn quoted(value: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return Some(&value[1..value.len() - 1]);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
