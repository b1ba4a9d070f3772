//! `map.csv` codec: one row per exported memory, RFC-4180-style quoting,
//! no header.

use mnemon_core::errors::BundleError;
use mnemon_core::MnemonResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRow {
    pub id: i64,
    pub content_hash: String,
    pub context: String,
    pub kind: String,
    pub path: String,
    pub language: String,
    pub line_start: String,
    pub line_end: String,
    pub symbol_name: String,
    pub symbol_kind: String,
}

pub fn write_rows(rows: &[MapRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let fields = [
            row.id.to_string(),
            escape(&row.content_hash),
            escape(&row.context),
            escape(&row.kind),
            escape(&row.path),
            escape(&row.language),
            escape(&row.line_start),
            escape(&row.line_end),
            escape(&row.symbol_name),
            escape(&row.symbol_kind),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

pub fn parse(text: &str) -> MnemonResult<Vec<MapRow>> {
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields = split_line(line).ok_or_else(|| malformed(lineno, "unbalanced quotes"))?;
        if fields.len() != 10 {
            return Err(malformed(lineno, "expected 10 fields"));
        }
        let id: i64 = fields[0]
            .parse()
            .map_err(|_| malformed(lineno, "id is not an integer"))?;
        let mut it = fields.into_iter().skip(1);
        rows.push(MapRow {
            id,
            content_hash: it.next().unwrap_or_default(),
            context: it.next().unwrap_or_default(),
            kind: it.next().unwrap_or_default(),
            path: it.next().unwrap_or_default(),
            language: it.next().unwrap_or_default(),
            line_start: it.next().unwrap_or_default(),
            line_end: it.next().unwrap_or_default(),
            symbol_name: it.next().unwrap_or_default(),
            symbol_kind: it.next().unwrap_or_default(),
        });
    }
    Ok(rows)
}

fn malformed(lineno: usize, detail: &str) -> mnemon_core::MnemonError {
    BundleError::Malformed {
        detail: format!("map.csv line {}: {detail}", lineno + 1),
    }
    .into()
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV line honoring quoted fields. `None` on unbalanced quotes.
fn split_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(current);
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, path: &str, symbol: &str) -> MapRow {
        MapRow {
            id,
            content_hash: "ab".repeat(32),
            context: "general".into(),
            kind: "code".into(),
            path: path.into(),
            language: "typescript".into(),
            line_start: "1".into(),
            line_end: "20".into(),
            symbol_name: symbol.into(),
            symbol_kind: "function".into(),
        }
    }

    #[test]
    fn round_trip_plain_rows() {
        let rows = vec![row(1, "src/a.ts", "alpha"), row(2, "src/b.ts", "beta")];
        let parsed = parse(&write_rows(&rows)).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn fields_with_commas_and_quotes_survive() {
        let tricky = row(3, "src/odd,name.ts", "say \"hi\"");
        let parsed = parse(&write_rows(&[tricky.clone()])).unwrap();
        assert_eq!(parsed[0], tricky);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = parse("1,too,few\n").unwrap_err();
        assert!(err.to_string().contains("10 fields"));
    }
}
