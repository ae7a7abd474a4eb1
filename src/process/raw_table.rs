/// A rectangular slice of a sheet with its header row promoted to column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names, cleaned, in sheet order.
    pub headers: Vec<String>,
    /// Cell text per row, always `headers.len()` wide.
    pub rows: Vec<Vec<String>>,
    /// Zero-based sheet row of `rows[0]`, for diagnostics.
    pub first_row: usize,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Sheet row number (1-based, as shown by a spreadsheet editor) of `rows[idx]`.
    pub fn sheet_row(&self, idx: usize) -> usize {
        self.first_row + idx + 1
    }
}
