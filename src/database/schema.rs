//! SQL generation for destination tables
//!
//! Destination tables hold one `TEXT` column per chunk column. The statements
//! work on both DuckDB and PostgreSQL; identifiers are always double-quoted
//! so dataset and column names are used verbatim.

/// Quote an identifier, doubling embedded double quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A destination table and the columns written to it
#[derive(Debug, Clone, Copy)]
pub struct DestinationTable<'a> {
    name: &'a str,
    columns: &'a [String],
}

impl<'a> DestinationTable<'a> {
    pub fn new(name: &'a str, columns: &'a [String]) -> Self {
        Self { name, columns }
    }

    pub fn columns(&self) -> &[String] {
        self.columns
    }

    /// Quoted, comma-separated column list
    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE IF NOT EXISTS` with one text column per chunk column
    pub fn create_table_sql(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .map(|c| format!("{} TEXT", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(self.name),
            definitions
        )
    }

    /// Single-row `INSERT` with `?` placeholders
    pub fn insert_sql(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(self.name),
            self.column_list(),
            placeholders
        )
    }

    /// `COPY ... FROM STDIN` in CSV format
    pub fn copy_in_sql(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
            quote_identifier(self.name),
            self.column_list()
        )
    }
}
