use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

/// Positional schema used when the pasted text carries no header line.
pub const CANONICAL_HEADERS: [&str; 9] = [
    "Title",
    "Description",
    "Price",
    "Original Price",
    "Category",
    "Tags",
    "Sizes",
    "Images",
    "Active",
];

const FOUR_SPACES: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Title,
    Description,
    Price,
    OriginalPrice,
    Category,
    Tags,
    Sizes,
    Images,
    Active,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Title,
        Column::Description,
        Column::Price,
        Column::OriginalPrice,
        Column::Category,
        Column::Tags,
        Column::Sizes,
        Column::Images,
        Column::Active,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Column::Title => "Title",
            Column::Description => "Description",
            Column::Price => "Price",
            Column::OriginalPrice => "Original Price",
            Column::Category => "Category",
            Column::Tags => "Tags",
            Column::Sizes => "Sizes",
            Column::Images => "Images",
            Column::Active => "Active",
        }
    }

    /// Maps a header cell to its column: exact name first, then the longest
    /// canonical name contained in the cell ("Original Price (INR)" is not Price).
    pub fn from_header(cell: &str) -> Option<Self> {
        let normalized = cell.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(exact) = Self::ALL
            .iter()
            .find(|column| column.label().to_lowercase() == normalized)
        {
            return Some(*exact);
        }
        Self::ALL
            .iter()
            .filter(|column| normalized.contains(&column.label().to_lowercase()))
            .max_by_key(|column| column.label().len())
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedTable {
    /// Active column order: the detected header line, or the expected schema.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub header_detected: bool,
}

impl TokenizedTable {
    pub fn columns(&self) -> Vec<Option<Column>> {
        self.headers
            .iter()
            .map(|header| Column::from_header(header))
            .collect()
    }

    /// Tab-joined text that tokenizes back into this same table.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if self.header_detected {
            lines.push(self.headers.join("\t"));
        }
        lines.extend(self.rows.iter().map(|row| row.join("\t")));
        lines.join("\n")
    }
}

/// Rewrites every run of four spaces to a tab, left to right. Applying it
/// twice is the same as applying it once since no four-space run survives.
pub fn rewrite_delimiters(text: &str) -> String {
    text.replace(FOUR_SPACES, "\t")
}

pub fn tokenize(text: &str, expected_headers: &[&str]) -> TokenizedTable {
    let rewritten = rewrite_delimiters(text);
    let mut lines = read_cells(&rewritten)
        .into_iter()
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .peekable();

    let header_detected = lines
        .peek()
        .is_some_and(|first| looks_like_header(first, expected_headers));

    let headers: Vec<String> = if header_detected {
        lines.next().unwrap_or_default()
    } else {
        expected_headers.iter().map(|h| h.to_string()).collect()
    };

    let width = headers.len();
    let rows = lines
        .map(|cells| fit_to_width(cells, width))
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    TokenizedTable {
        headers,
        rows,
        header_detected,
    }
}

/// Tab-delimited records with every cell trimmed. Quotes are literal text.
fn read_cells(text: &str) -> Vec<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    // A &str source is valid UTF-8 and flexible records never mismatch in
    // length, so no record can fail to read.
    reader
        .records()
        .filter_map(Result::ok)
        .map(|record| record.iter().map(str::to_string).collect())
        .collect()
}

// Best-effort: a data row whose cell happens to contain its column's name
// (a product titled "Title Tee") is read as a header line.
fn looks_like_header(cells: &[String], expected: &[&str]) -> bool {
    expected.iter().enumerate().any(|(idx, header)| {
        let header = header.trim().to_lowercase();
        !header.is_empty()
            && cells
                .get(idx)
                .is_some_and(|cell| cell.to_lowercase().contains(&header))
    })
}

fn fit_to_width(mut cells: Vec<String>, width: usize) -> Vec<String> {
    cells.resize(width, String::new());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAREE_ROW: &str = "Silk Saree\tNice saree\t1499\t1999\tWomen > Saree\tsilk,wedding\tS,M,L\tred:#FF0000|http://x/a.jpg,http://x/b.jpg\ttrue";

    #[test]
    fn four_spaces_become_a_tab() {
        assert_eq!(rewrite_delimiters("a    b"), "a\tb");
        assert_eq!(rewrite_delimiters("a        b"), "a\t\tb");
        assert_eq!(rewrite_delimiters("a     b"), "a\t b");
        assert_eq!(rewrite_delimiters("a   b"), "a   b");
    }

    #[test]
    fn rows_without_header_use_canonical_schema() {
        let table = tokenize(SAREE_ROW, &CANONICAL_HEADERS);
        assert!(!table.header_detected);
        assert_eq!(table.headers, CANONICAL_HEADERS.to_vec());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][4], "Women > Saree");
        assert_eq!(table.rows[0][8], "true");
    }

    #[test]
    fn canonical_header_line_is_consumed_in_any_case() {
        let text = format!(
            "{}\n{SAREE_ROW}",
            CANONICAL_HEADERS.join("\t").to_uppercase()
        );
        let table = tokenize(&text, &CANONICAL_HEADERS);
        assert!(table.header_detected);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "Silk Saree");
    }

    #[test]
    fn detected_header_drives_column_order() {
        let text = "Category\tTitle\tPrice\nWomen > Saree\tSilk Saree\t1499";
        let table = tokenize(text, &CANONICAL_HEADERS);
        // only position 2 lines up with the canonical schema
        assert!(table.header_detected);
        assert_eq!(
            table.columns(),
            vec![Some(Column::Category), Some(Column::Title), Some(Column::Price)]
        );
        assert_eq!(table.rows[0], vec!["Women > Saree", "Silk Saree", "1499"]);
    }

    #[test]
    fn data_cell_resembling_a_header_is_read_as_header() {
        let table = tokenize("Title Tee\tplain\t10", &CANONICAL_HEADERS);
        assert!(table.header_detected);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn blank_lines_dropped_and_ragged_rows_fitted() {
        let text = "a\tb\n\n   \n\t\nc\td\te\tf\tg\th\ti\tj\tk\tl\n";
        let table = tokenize(text, &CANONICAL_HEADERS);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].len(), 9);
        assert_eq!(table.rows[0][1], "b");
        assert_eq!(table.rows[0][2], "");
        assert_eq!(table.rows[1][8], "k");
    }

    #[test]
    fn leading_empty_cell_keeps_alignment() {
        let table = tokenize("\tdesc only\t10", &CANONICAL_HEADERS);
        assert_eq!(table.rows[0][0], "");
        assert_eq!(table.rows[0][1], "desc only");
    }

    #[test]
    fn space_typed_columns_tokenize_like_tabs() {
        let spaced = "Silk Saree    Nice saree    1499";
        let tabbed = "Silk Saree\tNice saree\t1499";
        assert_eq!(
            tokenize(spaced, &CANONICAL_HEADERS),
            tokenize(tabbed, &CANONICAL_HEADERS)
        );
    }

    #[test]
    fn quotes_are_literal_cell_text() {
        let table = tokenize("\"Silk\" Saree\tsays \"hi\t10", &CANONICAL_HEADERS);
        assert_eq!(table.rows[0][0], "\"Silk\" Saree");
        assert_eq!(table.rows[0][1], "says \"hi");
        assert_eq!(table.rows[0][2], "10");
    }

    #[test]
    fn single_row_with_header_word_in_its_column_is_consumed_as_header() {
        let row = SAREE_ROW.replacen("Women > Saree", "NoSuchCategory", 1);
        let table = tokenize(&row, &CANONICAL_HEADERS);
        assert!(table.header_detected);
        assert_eq!(table.headers[4], "NoSuchCategory");
        assert!(table.rows.is_empty());

        let with_header = format!("{}\n{row}", CANONICAL_HEADERS.join("\t"));
        let table = tokenize(&with_header, &CANONICAL_HEADERS);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][4], "NoSuchCategory");
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let table = tokenize("a\tb\r\nc\td\r\n", &CANONICAL_HEADERS);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "b");
    }

    #[test]
    fn column_from_header_prefers_longest_name() {
        assert_eq!(Column::from_header("price"), Some(Column::Price));
        assert_eq!(
            Column::from_header("Original Price (INR)"),
            Some(Column::OriginalPrice)
        );
        assert_eq!(Column::from_header("Product Title"), Some(Column::Title));
        assert_eq!(Column::from_header("SKU"), None);
        assert_eq!(Column::from_header(""), None);
    }

    proptest! {
        #[test]
        fn rewrite_is_idempotent(text in "[a-z \t\n]{0,80}") {
            let once = rewrite_delimiters(&text);
            prop_assert_eq!(rewrite_delimiters(&once), once);
        }

        #[test]
        fn retokenizing_joined_grid_is_stable(text in "[a-cT \t\n]{0,120}") {
            let table = tokenize(&text, &CANONICAL_HEADERS);
            let again = tokenize(&table.to_text(), &CANONICAL_HEADERS);
            prop_assert_eq!(again, table);
        }
    }
}
