use std::io::Read;

/// A parsed export file before any schema is imposed: the headers exactly as
/// they appeared (trimmed), and every row as strings. Kept around untouched
/// so callers can trace a normalized record back to its source columns.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cell accessor tolerant of ragged rows; missing cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(crate) fn parse_table<R: Read>(reader: R) -> Result<RawTable, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_headers_and_rows_with_trimming() {
        let table = parse_table(Cursor::new(
            " שם מועמד , שם המשרה \n דנה לוי , מפתח Backend \n",
        ))
        .expect("parse");

        assert_eq!(table.headers, vec!["שם מועמד", "שם המשרה"]);
        assert_eq!(table.cell(0, 0), "דנה לוי");
        assert_eq!(table.cell(0, 1), "מפתח Backend");
    }

    #[test]
    fn ragged_rows_read_as_empty_cells() {
        let table = parse_table(Cursor::new("a,b,c\n1,2\n")).expect("parse");
        assert_eq!(table.cell(0, 2), "");
        assert_eq!(table.cell(5, 0), "");
    }
}
