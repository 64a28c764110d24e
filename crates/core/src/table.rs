use csv::ReaderBuilder;
use serde_json::Value;

use crate::error::{Result, ScanError};

/// First-row cells that mark a header row rather than data. Trimmed,
/// case-insensitive match. Heuristic: a real slug that happens to equal one of
/// these is dropped too; the sheet format gives us nothing better to go on.
const HEADER_SYNONYMS: [&str; 10] = [
    "slug",
    "name",
    "wallet",
    "address",
    "handle",
    "id",
    "スラッグ",
    "名前",
    "ウォレット",
    "アドレス",
];

/// Parse a fetched table payload into rows of cells.
///
/// The gviz endpoint answers with either plain CSV or a JSON table wrapped in
/// a `google.visualization.Query.setResponse(...)` callback envelope,
/// depending on the export parameters; both are accepted here.
pub fn parse_table(raw: &str) -> Result<Vec<Vec<String>>> {
    if looks_like_gviz(raw) {
        parse_gviz(raw)
    } else {
        parse_csv(raw)
    }
}

fn looks_like_gviz(raw: &str) -> bool {
    let head = raw.trim_start_matches('\u{FEFF}').trim_start();
    head.starts_with("/*O_o*/") || head.contains("google.visualization.Query.setResponse(")
}

fn parse_csv(raw: &str) -> Result<Vec<Vec<String>>> {
    let text = raw.strip_prefix('\u{FEFF}').unwrap_or(raw);
    check_quotes(text)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ScanError::Parse(e.to_string()))?;
        let row: Vec<String> = record.iter().map(|cell| cell.to_string()).collect();
        if row.len() == 1 && row[0].is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// The csv reader recovers from an unterminated quote by swallowing the rest
/// of the input into one field; reject that case up front instead.
///
/// Quoting only applies when the quote opens a field (start of input, after a
/// comma, or after a line break); a stray quote inside an unquoted field is a
/// literal character, same as the reader treats it.
fn check_quotes(text: &str) -> Result<()> {
    let mut chars = text.chars().peekable();
    let mut at_field_start = true;
    while let Some(ch) = chars.next() {
        if at_field_start && ch == '"' {
            let mut closed = false;
            while let Some(inner) = chars.next() {
                if inner == '"' {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                    } else {
                        closed = true;
                        break;
                    }
                }
            }
            if !closed {
                return Err(ScanError::Parse("unterminated quote".into()));
            }
            at_field_start = false;
        } else {
            at_field_start = matches!(ch, ',' | '\n' | '\r');
        }
    }
    Ok(())
}

fn parse_gviz(raw: &str) -> Result<Vec<Vec<String>>> {
    let open = raw
        .find('(')
        .ok_or_else(|| ScanError::Parse("gviz envelope without payload".into()))?;
    let close = raw
        .rfind(')')
        .filter(|&idx| idx > open)
        .ok_or_else(|| ScanError::Parse("gviz envelope not closed".into()))?;
    let value: Value = serde_json::from_str(&raw[open + 1..close])?;
    let rows = match value.pointer("/table/rows") {
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(ScanError::Parse("gviz table.rows is not an array".into())),
        None => return Ok(Vec::new()),
    };
    let mut out = Vec::new();
    for row in rows {
        let cells = match row.get("c") {
            Some(Value::Array(cells)) => cells,
            _ => continue,
        };
        out.push(cells.iter().map(cell_text).collect());
    }
    Ok(out)
}

fn cell_text(cell: &Value) -> String {
    match cell.get("v") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| i.to_string())
            .unwrap_or_else(|| n.to_string()),
        Some(Value::Bool(b)) => b.to_string(),
        _ => match cell.get("f") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        },
    }
}

/// Drop the first row iff one of its cells matches a header synonym.
pub fn strip_header_row(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let is_header = rows.first().is_some_and(|first| {
        first.iter().any(|cell| {
            let trimmed = cell.trim().to_lowercase();
            HEADER_SYNONYMS.iter().any(|syn| trimmed == *syn)
        })
    });
    if is_header {
        rows.remove(0);
    }
    rows
}
