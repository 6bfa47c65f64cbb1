use serde_json::Value;

const MAX_COL_WIDTH: usize = 60;

/// Render a JSON array of objects (or scalars) as an ASCII table.
/// Returns `None` when the value is not a non-empty array.
pub fn render_table(val: &Value) -> Option<String> {
    let (cols, rows) = table_from_array(val)?;
    if rows.is_empty() { return None; }

    let mut widths: Vec<usize> = cols.iter().map(|s| display_len(s).min(MAX_COL_WIDTH)).collect();
    for r in &rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(MAX_COL_WIDTH); }
        }
    }

    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 5);
    out.push(sep.clone());
    out.push(build_row(&cols, &widths));
    out.push(sep.clone());
    for r in &rows {
        out.push(build_row(r, &widths));
    }
    out.push(sep);
    out.push(format!("rows: {}", rows.len()));
    Some(out.join("\n"))
}

/// Print `val` as a table, falling back to pretty JSON.
pub fn print_value(val: &Value, force_json: bool) {
    if !force_json {
        if let Some(t) = render_table(val) {
            println!("{}", t);
            return;
        }
    }
    match serde_json::to_string_pretty(val) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", val),
    }
}

// Columns keep first-seen key order so `id` stays in front.
fn table_from_array(val: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let arr = val.as_array()?;
    let mut keys: Vec<String> = Vec::new();
    let mut all_objects = true;
    for el in arr {
        if let Value::Object(map) = el {
            for k in map.keys() { if !keys.contains(k) { keys.push(k.clone()); } }
        } else {
            all_objects = false;
        }
    }
    if all_objects && !keys.is_empty() {
        let rows = arr
            .iter()
            .map(|el| keys.iter().map(|k| el.get(k).map(to_cell_string).unwrap_or_default()).collect())
            .collect();
        return Some((keys, rows));
    }
    let rows = arr.iter().map(|el| vec![to_cell_string(el)]).collect();
    Some((vec!["value".to_string()], rows))
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::from("-"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|i| i.get("name").is_some()) => items
            .iter()
            .filter_map(|i| i.get("name").and_then(|n| n.as_str()))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn display_len(s: &str) -> usize { s.chars().count() }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

// Ids, counts and other numbers line up on the right.
fn align_of(cell: &str) -> Align {
    let c = cell.trim();
    let numeric = c.bytes().any(|b| b.is_ascii_digit()) && c.parse::<f64>().is_ok();
    if numeric { Align::Right } else { Align::Left }
}

fn build_separator(widths: &[usize]) -> String {
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    format!("+{}+", dashes.join("+"))
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let raw = cells.get(i).map(String::as_str).unwrap_or("");
            let text = truncate(raw, w);
            match align_of(raw) {
                Align::Right => format!(" {:>w$} ", text),
                Align::Left => format!(" {:<w$} ", text),
            }
        })
        .collect();
    format!("|{}|", padded.join("|"))
}

fn truncate(s: &str, max: usize) -> String {
    if display_len(s) <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
