use std::{borrow::Cow, fmt::Write as _};

use crate::grid::RawGrid;

/// Cells longer than this are cut and end with an ellipsis.
pub const MAX_CELL_WIDTH: usize = 40;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let cells = rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let headers = headers.iter().map(|h| clip(h)).collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in &cells {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Renders the first `limit` rows of a grid under its column names.
pub fn render_grid(grid: &RawGrid, limit: usize) -> String {
    render_table(&grid.columns, &grid.display_rows(limit))
}

pub fn print_grid(grid: &RawGrid, limit: usize) {
    print!("{}", render_grid(grid, limit));
}

fn format_row<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let value = value.as_ref();
            let padding = width.saturating_sub(display_width(value));
            format!("{value}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn clip(value: &str) -> String {
    let flattened = flatten_whitespace(value);
    if display_width(&flattened) <= MAX_CELL_WIDTH {
        return flattened.into_owned();
    }
    let mut clipped = String::new();
    let mut width = 0;
    for ch in flattened.chars() {
        let ch_width = char_width(ch);
        if width + ch_width > MAX_CELL_WIDTH - 1 {
            break;
        }
        width += ch_width;
        clipped.push(ch);
    }
    clipped.push('…');
    clipped
}

fn flatten_whitespace(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn display_width(value: &str) -> usize {
    value.chars().map(char_width).sum()
}

// CJK and full-width forms occupy two terminal cells.
fn char_width(ch: char) -> usize {
    match ch as u32 {
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn columns_align_with_wide_characters() {
        let rendered = render_table(
            &["名稱".to_string(), "qty".to_string()],
            &[vec!["蘋果汁".to_string(), "3".to_string()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "名稱    qty");
        assert_eq!(lines[1], "------  ---");
        assert_eq!(lines[2], "蘋果汁  3");
    }

    #[test]
    fn long_and_multiline_cells_are_flattened_and_clipped() {
        let long = "x".repeat(60);
        let rendered = render_table(&["c".to_string()], &[vec![long], vec!["a\nb".to_string()]]);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(display_width(lines[2]), MAX_CELL_WIDTH);
        assert!(lines[2].ends_with('…'));
        assert_eq!(lines[3], "a b");
    }

    #[test]
    fn render_grid_respects_limit() {
        let grid = RawGrid::from_rows(vec![
            vec![Value::Integer(1), Value::Real(2.0)],
            vec![Value::Integer(3), Value::Boolean(true)],
        ]);
        let rendered = render_grid(&grid, 1);
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.starts_with("Column_0  Column_1"));
        assert!(rendered.contains("1         2"));
    }
}
