//! Aligned plain-text rendering for `--table` output and sniff reports.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::row::Row;

const COLUMN_GAP: &str = "  ";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Renders pipeline output. Keyed rows use the union of their keys, in
/// first-seen order, as the header; positional rows use their first row.
pub fn render_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    if !first.is_keyed() {
        let cells = rows.iter().map(Row::to_strings).collect::<Vec<_>>();
        return render_table(&cells[0], &cells[1..]);
    }

    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        if let Row::Keyed(record) = row {
            for key in record.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.to_string());
                }
            }
        }
    }
    let body = rows
        .iter()
        .map(|row| match row {
            Row::Keyed(record) => headers
                .iter()
                .map(|h| record.get(h).map(|v| v.as_display()).unwrap_or_default())
                .collect(),
            Row::Positional(_) => row.to_strings(),
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&headers, &body)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.trim_end().to_string()
}

/// Character count ignoring ANSI color sequences.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn columns_align_to_widest_cell() {
        let strings = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        let rendered = render_table(
            &strings(&["id", "name"]),
            &[strings(&["1", "Alexandra"]), strings(&["22", "Bo"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id   name");
        assert_eq!(lines[1], "---  ---------");
        assert_eq!(lines[2], "1    Alexandra");
        assert_eq!(lines[3], "22   Bo");
    }

    #[test]
    fn keyed_rows_share_a_header_union() {
        let rows = vec![
            Row::Keyed([("a", Value::Long(1))].into_iter().collect()),
            Row::Keyed([("b", "line\nbreak")].into_iter().collect()),
        ];
        let rendered = render_rows(&rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "a    b");
        assert_eq!(lines[2], "1");
        assert_eq!(lines[3], "     line break");
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_rows(&[]), "");
    }
}
