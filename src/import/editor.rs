//! Paste-box state for the bulk import screen.
//!
//! The caller owns an [`EditorState`] and sends it back with every action;
//! everything else (grid, parsed rows, suggestions) is derived from the text
//! on demand.

use crate::catalog::Category;
use crate::import::category::{CategorySuggestion, PATH_SEPARATOR, suggest};
use crate::import::tokenizer::{CANONICAL_HEADERS, Column, tokenize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorState {
    /// Text after the four-space rewrite.
    pub text: String,
    /// Char offset into `text`.
    pub cursor: usize,
    pub picker_open: bool,
    pub highlighted: usize,
}

/// Cell under the cursor, as char offsets into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSpan {
    pub column: Option<Column>,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorAction {
    Edit { text: String, cursor: usize },
    MoveHighlight { delta: isize },
    /// Selects `index`, or the highlighted suggestion when absent.
    Select { index: Option<usize> },
    Browse,
    Close,
}

/// Applies the four-space rewrite and carries a char cursor across it. A
/// cursor inside a rewritten run lands after the tab.
pub fn rewrite_with_cursor(raw: &str, cursor: usize) -> (String, usize) {
    let chars: Vec<char> = raw.chars().collect();
    let cursor = cursor.min(chars.len());
    let mut out = String::with_capacity(raw.len());
    let mut out_len = 0;
    let mut mapped = None;
    let mut i = 0;
    while i < chars.len() {
        if i == cursor {
            mapped = Some(out_len);
        }
        if chars[i..].starts_with(&[' '; 4]) {
            out.push('\t');
            out_len += 1;
            if mapped.is_none() && cursor > i && cursor < i + 4 {
                mapped = Some(out_len);
            }
            i += 4;
        } else {
            out.push(chars[i]);
            out_len += 1;
            i += 1;
        }
    }
    (out, mapped.unwrap_or(out_len))
}

impl EditorState {
    #[cfg(test)]
    pub fn new(raw: &str, cursor: usize) -> Self {
        let mut state = Self::default();
        state.edit(raw, cursor);
        state
    }

    /// Replaces the text; the picker opens whenever the cursor lands in the
    /// Category column.
    pub fn edit(&mut self, raw: &str, cursor: usize) {
        let (text, cursor) = rewrite_with_cursor(raw, cursor);
        self.text = text;
        self.cursor = cursor;
        self.highlighted = 0;
        self.picker_open = self.in_category_cell();
    }

    pub fn active_cell(&self) -> Option<CellSpan> {
        let chars: Vec<char> = self.text.chars().collect();
        let cursor = self.cursor.min(chars.len());
        let before = &chars[..cursor];

        let line_start = before
            .iter()
            .rposition(|ch| *ch == '\n')
            .map_or(0, |pos| pos + 1);
        let line_end = chars[cursor..]
            .iter()
            .position(|ch| *ch == '\n')
            .map_or(chars.len(), |pos| cursor + pos);
        let line = before.iter().filter(|ch| **ch == '\n').count();

        let start = chars[line_start..cursor]
            .iter()
            .rposition(|ch| *ch == '\t')
            .map_or(line_start, |pos| line_start + pos + 1);
        let end = chars[cursor..line_end]
            .iter()
            .position(|ch| *ch == '\t')
            .map_or(line_end, |pos| cursor + pos);
        let column_index = chars[line_start..cursor]
            .iter()
            .filter(|ch| **ch == '\t')
            .count();

        let table = tokenize(&self.text, &CANONICAL_HEADERS);
        let first_line = self.text.lines().position(|l| !l.trim().is_empty());
        if table.header_detected && first_line == Some(line) {
            return None;
        }
        let column = table
            .headers
            .get(column_index)
            .and_then(|header| Column::from_header(header));

        Some(CellSpan {
            column,
            start,
            end,
        })
    }

    fn category_cell(&self) -> Option<CellSpan> {
        self.active_cell()
            .filter(|cell| cell.column == Some(Column::Category))
    }

    fn in_category_cell(&self) -> bool {
        self.category_cell().is_some()
    }

    /// Category cell text up to the cursor; `None` outside the Category column.
    pub fn category_query(&self) -> Option<String> {
        let cell = self.category_cell()?;
        Some(self.text.chars().skip(cell.start).take(self.cursor - cell.start).collect())
    }

    pub fn suggestions(&self, categories: &[Category]) -> Vec<CategorySuggestion> {
        if !self.picker_open {
            return Vec::new();
        }
        match self.category_query() {
            Some(query) => suggest(&query, categories),
            None => Vec::new(),
        }
    }

    pub fn move_highlight(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.highlighted = 0;
            return;
        }
        let len = len as isize;
        self.highlighted = (self.highlighted as isize + delta).rem_euclid(len) as usize;
    }

    /// Writes the suggestion's full path into the cell. Leaf selections close
    /// the picker; parents keep it open for further typing or browsing.
    pub fn select(&mut self, suggestion: &CategorySuggestion) {
        let Some(cell) = self.category_cell() else {
            return;
        };
        self.replace_cell(cell, &suggestion.path_text);
        self.picker_open = suggestion.has_children;
    }

    pub fn browse_children(&mut self) {
        let Some(cell) = self.category_cell() else {
            return;
        };
        let current: String = self
            .text
            .chars()
            .skip(cell.start)
            .take(cell.end - cell.start)
            .collect();
        let current = current.trim().trim_end_matches('>').trim_end();
        let browsed = if current.is_empty() {
            String::new()
        } else {
            format!("{current}{PATH_SEPARATOR}")
        };
        self.replace_cell(cell, &browsed);
        self.picker_open = true;
    }

    pub fn close_picker(&mut self) {
        self.picker_open = false;
        self.highlighted = 0;
    }

    fn replace_cell(&mut self, cell: CellSpan, replacement: &str) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut text: String = chars[..cell.start].iter().collect();
        text.push_str(replacement);
        text.extend(&chars[cell.end..]);
        self.text = text;
        self.cursor = cell.start + replacement.chars().count();
        self.highlighted = 0;
    }

    /// Applies one action and returns the suggestions for the resulting state.
    pub fn apply(
        &mut self,
        action: EditorAction,
        categories: &[Category],
    ) -> Vec<CategorySuggestion> {
        match action {
            EditorAction::Edit { text, cursor } => self.edit(&text, cursor),
            EditorAction::MoveHighlight { delta } => {
                let len = self.suggestions(categories).len();
                self.move_highlight(delta, len);
            }
            EditorAction::Select { index } => {
                let index = index.unwrap_or(self.highlighted);
                if let Some(choice) = self.suggestions(categories).into_iter().nth(index) {
                    self.select(&choice);
                }
            }
            EditorAction::Browse => self.browse_children(),
            EditorAction::Close => self.close_picker(),
        }
        self.suggestions(categories)
    }
}
