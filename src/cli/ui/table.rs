use std::fmt::{self, Display, Formatter};

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};

use super::painter::Painter;

/// Rows of terminal cells rendered with rounded borders.
#[derive(Debug)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    right_aligned: Vec<usize>,
}

impl Table {
    pub(crate) fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            right_aligned: Vec::new(),
        }
    }

    /// A two-column field/value table with muted field names.
    pub(crate) fn key_value(painter: &Painter, fields: Vec<(&str, String)>) -> Self {
        let mut table = Self::new(["field", "value"]);
        for (field, value) in fields {
            table.push_row(vec![painter.muted(field), value]);
        }
        table
    }

    /// Right-aligns a column, header included.
    #[must_use]
    pub(crate) fn align_right(mut self, column: usize) -> Self {
        self.right_aligned.push(column);
        self
    }

    pub(crate) fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(&self.headers);
        for row in &self.rows {
            builder.push_record(row);
        }
        let mut table = builder.build();
        table.with(Style::rounded());
        for column in &self.right_aligned {
            table.modify(Columns::one(*column), Alignment::right());
        }
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn renders_headers_and_rows() {
        let mut table = Table::new(["uuid", "name"]);
        table.push_row(vec!["180d".into(), "Heart Rate".into()]);
        table.push_row(vec!["180f".into(), String::new()]);

        assert_snapshot!(table.to_string(), @r"
        ╭──────┬────────────╮
        │ uuid │ name       │
        ├──────┼────────────┤
        │ 180d │ Heart Rate │
        │ 180f │            │
        ╰──────┴────────────╯
        ");
    }

    #[test]
    fn right_aligned_columns_pad_on_the_left() {
        let mut table = Table::new(["service", "characteristics"]).align_right(1);
        table.push_row(vec!["180d".into(), "2".into()]);

        assert_snapshot!(table.to_string(), @r"
        ╭─────────┬─────────────────╮
        │ service │ characteristics │
        ├─────────┼─────────────────┤
        │ 180d    │               2 │
        ╰─────────┴─────────────────╯
        ");
    }

    #[test]
    fn key_value_table_renders_field_value_pairs() {
        let painter = Painter::new(false);
        let table = Table::key_value(
            &painter,
            vec![("name", "Sensor".into()), ("adapter", "hci0".into())],
        );

        assert!(!table.is_empty());
        assert_snapshot!(table.to_string(), @r"
        ╭─────────┬────────╮
        │ field   │ value  │
        ├─────────┼────────┤
        │ name    │ Sensor │
        │ adapter │ hci0   │
        ╰─────────┴────────╯
        ");
    }

    #[test]
    fn empty_table_has_only_headers() {
        assert!(Table::new(["uuid"]).is_empty());
    }
}
