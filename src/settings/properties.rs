//! `key=value` record files.
//!
//! Lines starting with `#` or `!` are comments. Lines without `=` or with an
//! empty key are skipped, so a damaged file degrades to missing keys.

use std::collections::BTreeMap;

pub(crate) type SettingsRecord = BTreeMap<String, String>;

pub(crate) fn parse(content: &str) -> SettingsRecord {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key.to_string(), unescape(value.trim_start())))
}

pub(crate) fn serialize(id: u64, record: &SettingsRecord) -> String {
    let mut out = format!("# ID: {id}\n");
    for (key, value) in record {
        out.push_str(key);
        out.push('=');
        out.push_str(&escape(value));
        out.push('\n');
    }
    out
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            // leading whitespace would be eaten by the reader
            ' ' | '\t' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
