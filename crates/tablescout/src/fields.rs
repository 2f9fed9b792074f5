//! Target field loading.
//!
//! Fields come from a JSON file (`[{"name", "type", "description"}, ...]`)
//! or, when none is given, from the first markdown table in the requirement
//! document whose header has a `name` (or `field`) column next to a `type` or
//! `description` column:
//!
//! ```markdown
//! | Field            | Type    | Description                 |
//! |------------------|---------|-----------------------------|
//! | `game_id`        | STRING  | Unique game identifier      |
//! | predicted_spread | FLOAT64 | Model's predicted spread    |
//! ```

use anyhow::{Context, Result};
use std::path::Path;

use tablescout_core::models::TargetField;

/// Read a JSON array of target fields.
pub fn load_fields_file(path: &Path) -> Result<Vec<TargetField>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fields file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fields file: {}", path.display()))
}

/// Fields from `fields_path` if given, otherwise from the document's field table.
pub fn resolve_fields(document: &str, fields_path: Option<&Path>) -> Result<Vec<TargetField>> {
    match fields_path {
        Some(path) => load_fields_file(path),
        None => {
            let fields = extract_field_table(document);
            if fields.is_empty() {
                tracing::warn!("no field table found in document; running without target fields");
            } else {
                tracing::debug!(count = fields.len(), "extracted fields from document table");
            }
            Ok(fields)
        }
    }
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_start_matches('|').trim_end_matches('|');
    trimmed
        .split('|')
        .map(|cell| cell.trim().trim_matches('`').trim().to_string())
        .collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

struct Columns {
    name: usize,
    field_type: Option<usize>,
    description: Option<usize>,
}

fn header_columns(cells: &[String]) -> Option<Columns> {
    let position = |keys: &[&str]| {
        cells
            .iter()
            .position(|c| keys.contains(&c.to_lowercase().as_str()))
    };
    let name = position(&["name", "field", "field name", "column"])?;
    let field_type = position(&["type", "data type"]);
    let description = position(&["description", "meaning", "notes"]);
    // A lone name column also matches roster tables.
    if field_type.is_none() && description.is_none() {
        return None;
    }
    Some(Columns {
        name,
        field_type,
        description,
    })
}

/// Extract target fields from the first markdown field table in `document`.
///
/// Returns an empty list when there is no such table. Rows with a blank name
/// are skipped.
pub fn extract_field_table(document: &str) -> Vec<TargetField> {
    let lines: Vec<&str> = document.lines().collect();

    let mut i = 0;
    while i + 1 < lines.len() {
        let line = lines[i].trim();
        if !line.starts_with('|') {
            i += 1;
            continue;
        }
        let header = split_row(line);
        let separator = split_row(lines[i + 1]);
        let columns = match header_columns(&header) {
            Some(c) if is_separator(&separator) => c,
            _ => {
                i += 1;
                continue;
            }
        };

        let cell = |cells: &[String], idx: Option<usize>| {
            idx.and_then(|i| cells.get(i)).cloned().unwrap_or_default()
        };

        return lines[i + 2..]
            .iter()
            .take_while(|l| l.trim().starts_with('|'))
            .map(|l| split_row(l))
            .filter_map(|cells| {
                let name = cell(&cells, Some(columns.name));
                if name.is_empty() {
                    return None;
                }
                Some(TargetField::new(
                    name,
                    cell(&cells, columns.field_type),
                    cell(&cells, columns.description),
                ))
            })
            .collect();
    }

    Vec::new()
}
