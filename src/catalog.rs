//! Stimulus catalog
//!
//! Loads the stimulus workbook (one sheet per list) and answers lookups by
//! list identifier and stimulus-file identifier.

use crate::config::{CatalogConfig, MatchMode};
use crate::error::PrepError;
use crate::types::{catalog_columns, CellValue, StimulusRow};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const AUDIO_EXTENSIONS: [&str; 4] = [".wav", ".mp3", ".ogg", ".m4a"];

/// Rows of one stimulus list, in sheet order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StimulusList {
    pub rows: Vec<StimulusRow>,
}

/// All stimulus lists keyed by list identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StimulusCatalog {
    lists: BTreeMap<String, StimulusList>,
    match_mode: MatchMode,
}

impl StimulusCatalog {
    /// Build a catalog from already-loaded lists
    pub fn from_lists(lists: BTreeMap<String, StimulusList>, match_mode: MatchMode) -> Self {
        Self { lists, match_mode }
    }

    /// Load every sheet of a workbook
    pub fn load(path: &Path, config: &CatalogConfig) -> Result<Self, PrepError> {
        let catalog_error = |source| PrepError::Catalog {
            path: path.to_path_buf(),
            source,
        };

        let mut workbook = open_workbook_auto(path).map_err(catalog_error)?;
        let mut lists = BTreeMap::new();

        for sheet_name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(catalog_error)?;
            let list_id = list_id_from_sheet(&sheet_name, &config.sheet_prefix);
            let rows = rows_from_range(range.rows());
            debug!(sheet = %sheet_name, list = %list_id, rows = rows.len(), "loaded stimulus sheet");
            lists.insert(list_id, StimulusList { rows });
        }

        info!(path = %path.display(), lists = lists.len(), "loaded stimulus catalog");
        Ok(Self::from_lists(lists, config.match_mode))
    }

    /// List identifiers in sorted order
    pub fn list_ids(&self) -> Vec<String> {
        self.lists.keys().cloned().collect()
    }

    pub fn list(&self, list_id: &str) -> Option<&StimulusList> {
        self.lists.get(list_id)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// First row of `list_id` whose `QFile` cell matches `qfile`
    pub fn lookup(&self, list_id: &str, qfile: &str) -> Option<&StimulusRow> {
        let qfile = strip_audio_extension(qfile.trim());
        if qfile.is_empty() {
            return None;
        }

        let list = self.lists.get(list_id)?;
        list.rows.iter().find(|row| {
            let Some(cell) = row.text(catalog_columns::Q_FILE) else {
                return false;
            };
            match self.match_mode {
                MatchMode::Exact => strip_audio_extension(cell.trim()) == qfile,
                MatchMode::Contains => cell.contains(qfile),
            }
        })
    }
}

/// `"List 1a"` with prefix `"List "` becomes `"1a"`.
///
/// Only the configured prefix is stripped, so `"Lists"` or `"Listening 1"`
/// keep their full name.
pub fn list_id_from_sheet(sheet_name: &str, prefix: &str) -> String {
    let trimmed = sheet_name.trim_start();
    trimmed
        .strip_prefix(prefix)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn strip_audio_extension(name: &str) -> &str {
    AUDIO_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Treat the first row as the header and convert the rest into stimulus rows
fn rows_from_range<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> Vec<StimulusRow> {
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header
        .iter()
        .map(|cell| cell_value(cell).to_string().trim().to_string())
        .collect();

    rows.map(|row| {
        let cells = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(idx, name)| {
                let value = row.get(idx).map(cell_value).unwrap_or_default();
                (name.clone(), value)
            })
            .collect();
        StimulusRow::new(cells)
    })
    .filter(|row| !row.is_blank())
    .collect()
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(qfile: &str, item: i64) -> StimulusRow {
        let mut cells = BTreeMap::new();
        cells.insert("QFile".to_string(), CellValue::Text(qfile.to_string()));
        cells.insert("ItemNo".to_string(), CellValue::Int(item));
        StimulusRow::new(cells)
    }

    fn catalog(mode: MatchMode) -> StimulusCatalog {
        let mut lists = BTreeMap::new();
        lists.insert(
            "1a".to_string(),
            StimulusList {
                rows: vec![row("13P.wav", 13), row("3P.wav", 3), row("4U", 4)],
            },
        );
        StimulusCatalog::from_lists(lists, mode)
    }

    #[test]
    fn test_list_id_from_sheet() {
        assert_eq!(list_id_from_sheet("List 1a", "List "), "1a");
        assert_eq!(list_id_from_sheet(" List  2b ", "List "), "2b");
        assert_eq!(list_id_from_sheet("Practice", "List "), "Practice");
        assert_eq!(list_id_from_sheet("Lists", "List "), "Lists");
        assert_eq!(list_id_from_sheet("Listening 1", "List "), "Listening 1");
    }

    #[test]
    fn test_exact_lookup_ignores_extension() {
        let catalog = catalog(MatchMode::Exact);
        let found = catalog.lookup("1a", "3P").unwrap();
        assert_eq!(found.text("ItemNo").as_deref(), Some("3"));
        assert_eq!(
            catalog.lookup("1a", "4U.mp3").unwrap().text("ItemNo").as_deref(),
            Some("4")
        );
    }

    #[test]
    fn test_contains_lookup_takes_first_substring_match() {
        let catalog = catalog(MatchMode::Contains);
        let found = catalog.lookup("1a", "3P").unwrap();
        assert_eq!(found.text("ItemNo").as_deref(), Some("13"));
    }

    #[test]
    fn test_lookup_misses() {
        let exact = catalog(MatchMode::Exact);
        assert!(exact.lookup("2b", "3P").is_none());
        assert!(exact.lookup("1a", "99P").is_none());
        assert!(exact.lookup("1a", "").is_none());
        assert!(catalog(MatchMode::Contains).lookup("1a", "").is_none());
    }

    #[test]
    fn test_rows_from_range_uses_header_and_skips_blank_rows() {
        let sheet = vec![
            vec![
                Data::String("ItemNo".into()),
                Data::String("QFile".into()),
                Data::Empty,
            ],
            vec![Data::Float(1.0), Data::String("1P.wav".into()), Data::Empty],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![Data::Float(2.0)],
        ];
        let rows = rows_from_range(sheet.iter().map(Vec::as_slice));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("QFile").as_deref(), Some("1P.wav"));
        assert_eq!(rows[1].text("ItemNo").as_deref(), Some("2"));
        assert_eq!(rows[1].get("QFile"), Some(&CellValue::Empty));
    }
}
