//! Mission/XP status CSV import for the opportunity map.
//!
//! Expected columns: `userEmail`, then one pair per mission named
//! `<MissionTitle> - Elegivel` and `<MissionTitle> - Conquistada`. Cell
//! value `"sim"` (any casing) means true; anything else means false.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::import::ImportError;
use crate::validation::validate_email_address;

const EMAIL_COLUMN: &str = "userEmail";
const ELIGIBLE_SUFFIX: &str = " - Elegivel";
const ACHIEVED_SUFFIX: &str = " - Conquistada";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissionStatus {
    pub title: String,
    pub eligible: bool,
    pub achieved: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissionImportRow {
    pub user_email: String,
    pub missions: Vec<MissionStatus>,
}

#[derive(Debug, Serialize)]
pub struct MissionImport {
    pub mission_titles: Vec<String>,
    pub rows: Vec<MissionImportRow>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct MissionColumns {
    eligible: Option<usize>,
    achieved: Option<usize>,
}

pub fn parse_missions_csv(data: &[u8]) -> Result<MissionImport, ImportError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);

    let headers = reader.headers()?.clone();
    let mut email_column = None;
    // BTreeMap keeps the output ordering stable across imports.
    let mut mission_columns: BTreeMap<String, MissionColumns> = BTreeMap::new();
    let mut warnings = Vec::new();

    for (index, header) in headers.iter().enumerate() {
        let header = header.trim();
        if header.eq_ignore_ascii_case(EMAIL_COLUMN) {
            email_column = Some(index);
        } else if let Some(title) = header.strip_suffix(ELIGIBLE_SUFFIX) {
            mission_columns.entry(title.to_string()).or_default().eligible = Some(index);
        } else if let Some(title) = header.strip_suffix(ACHIEVED_SUFFIX) {
            mission_columns.entry(title.to_string()).or_default().achieved = Some(index);
        } else {
            warnings.push(format!("Ignoring unknown column '{}'", header));
        }
    }

    let email_column =
        email_column.ok_or_else(|| ImportError::MissingColumn(EMAIL_COLUMN.to_string()))?;

    for (title, columns) in &mission_columns {
        if columns.eligible.is_none() {
            warnings.push(format!("Mission '{}' has no '{}' column", title, ELIGIBLE_SUFFIX.trim()));
        }
        if columns.achieved.is_none() {
            warnings.push(format!("Mission '{}' has no '{}' column", title, ACHIEVED_SUFFIX.trim()));
        }
    }

    let mut rows = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record?;
        let user_email = record
            .get(email_column)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if validate_email_address(&user_email).is_err() {
            warnings.push(format!(
                "Skipping row {}: invalid userEmail '{}'",
                row_number + 2,
                user_email
            ));
            continue;
        }

        let missions = mission_columns
            .iter()
            .map(|(title, columns)| MissionStatus {
                title: title.clone(),
                eligible: cell_is_yes(&record, columns.eligible),
                achieved: cell_is_yes(&record, columns.achieved),
            })
            .collect();

        rows.push(MissionImportRow {
            user_email,
            missions,
        });
    }

    Ok(MissionImport {
        mission_titles: mission_columns.keys().cloned().collect(),
        rows,
        warnings,
    })
}

fn cell_is_yes(record: &csv::StringRecord, column: Option<usize>) -> bool {
    column
        .and_then(|index| record.get(index))
        .map(|value| value.trim().eq_ignore_ascii_case("sim"))
        .unwrap_or(false)
}
