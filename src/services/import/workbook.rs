use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx, XlsxError};
use thiserror::Error;
use tracing::debug;

use super::decoder::{decode_contacts_sheet, decode_students_sheet, header_looks_like_contacts};
use super::{ImportContact, ImportStudent};

const STUDENTS_SHEET: &str = "students";
const CONTACTS_SHEETS: [&str; 2] = ["contacts", "контакты"];

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("не удалось прочитать xlsx: {0}")]
    Unreadable(String),

    #[error("в книге нет листов")]
    NoSheets,

    #[error("лист '{0}' не читается: {1}")]
    Sheet(String, String),
}

impl From<XlsxError> for WorkbookError {
    fn from(err: XlsxError) -> Self {
        WorkbookError::Unreadable(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodedWorkbook {
    pub rows: Vec<ImportStudent>,
    pub contacts: Vec<ImportContact>,
}

/// Decode an uploaded `.xlsx`. Students come from the `Students` sheet
/// (or the first sheet), with inline contacts; a separate contacts sheet
/// is read too when present.
pub fn parse_import_workbook(bytes: &[u8]) -> Result<DecodedWorkbook, WorkbookError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let names = workbook.sheet_names();

    let students_sheet = names
        .iter()
        .find(|n| n.trim().to_lowercase() == STUDENTS_SHEET)
        .or_else(|| names.first())
        .cloned()
        .ok_or(WorkbookError::NoSheets)?;

    let student_rows = read_sheet(&mut workbook, &students_sheet)?;
    let (rows, mut contacts) = decode_students_sheet(&student_rows);
    debug!(sheet = %students_sheet, rows = rows.len(), inline_contacts = contacts.len(), "decoded students sheet");

    if let Some(contacts_sheet) = find_contacts_sheet(&mut workbook, &names, &students_sheet) {
        // legacy sheet is optional: an unreadable one is ignored
        if let Ok(contact_rows) = read_sheet(&mut workbook, &contacts_sheet) {
            let extra = decode_contacts_sheet(&contact_rows);
            debug!(sheet = %contacts_sheet, contacts = extra.len(), "decoded contacts sheet");
            contacts.extend(extra);
        }
    }

    Ok(DecodedWorkbook { rows, contacts })
}

fn find_contacts_sheet(
    workbook: &mut Xlsx<Cursor<Vec<u8>>>,
    names: &[String],
    students_sheet: &str,
) -> Option<String> {
    if let Some(name) = names
        .iter()
        .find(|n| CONTACTS_SHEETS.contains(&n.trim().to_lowercase().as_str()))
    {
        return Some(name.clone());
    }

    names
        .iter()
        .filter(|n| n.as_str() != students_sheet)
        .find(|n| {
            read_sheet(workbook, n)
                .ok()
                .and_then(|rows| rows.into_iter().next())
                .is_some_and(|header| header_looks_like_contacts(&header))
        })
        .cloned()
}

fn read_sheet(workbook: &mut Xlsx<Cursor<Vec<u8>>>, name: &str) -> Result<Vec<Vec<String>>, WorkbookError> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| WorkbookError::Sheet(name.to_string(), e.to_string()))?;
    Ok(range_text(&range))
}

fn range_text(range: &Range<Data>) -> Vec<Vec<String>> {
    range.rows().map(|row| row.iter().map(cell_text).collect()).collect()
}

/// Render a typed cell the way it reads in the sheet. Whole numbers lose
/// their `.0`; date cells become their serial day number so the date
/// normaliser can take them.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (*f as i64).to_string(),
        Data::DateTime(dt) => (dt.as_f64().trunc() as i64).to_string(),
        other => other.to_string(),
    }
}
