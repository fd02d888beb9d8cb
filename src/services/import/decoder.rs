//! Turns raw worksheet cells into import rows.
//!
//! The students sheet carries 30 student columns followed by three inline
//! contact triples (full name, phone, relation). Cells are plain text at
//! this point; see [`super::workbook`] for how typed cells are rendered.

use std::str::FromStr;

use super::{ImportContact, ImportStudent};

pub const STUDENT_COLUMNS: usize = 30;
pub const INLINE_CONTACTS: usize = 3;
pub const STUDENT_SHEET_WIDTH: usize = STUDENT_COLUMNS + INLINE_CONTACTS * 3;
pub const CONTACT_SHEET_WIDTH: usize = 4;

/// Decode every data row of the students sheet. `rows[0]` is the header.
pub fn decode_students_sheet(rows: &[Vec<String>]) -> (Vec<ImportStudent>, Vec<ImportContact>) {
    let mut students = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut contacts = Vec::new();

    for cells in rows.iter().skip(1) {
        if let Some((student, inline)) = decode_row(cells) {
            students.push(student);
            contacts.extend(inline);
        }
    }
    (students, contacts)
}

/// Decode one students-sheet row. Rows blank in both the number and last
/// name columns are skipped.
pub fn decode_row(cells: &[String]) -> Option<(ImportStudent, Vec<ImportContact>)> {
    let r = pad(cells, STUDENT_SHEET_WIDTH);
    if r[0].trim().is_empty() && r[1].trim().is_empty() {
        return None;
    }

    let student = ImportStudent {
        student_number: r[0].trim().to_string(),
        last_name: r[1].trim().to_string(),
        first_name: r[2].trim().to_string(),
        middle_name: opt_text(r[3]),
        birth_date: r[4].trim().to_string(),
        gender: normalize_gender(r[5]),
        citizenship: opt_text(r[6]),
        school_id: int_or_zero(r[7]),
        class_label: r[8].trim().to_string(),
        admission_year: int_or_zero(r[9]),
        status: normalize_status(r[10]),
        reg_address: r[11].trim().to_string(),
        fact_address: r[12].trim().to_string(),
        student_phone: opt_text(r[13]),
        student_email: opt_text(r[14]),
        snils: opt_text(r[15]),
        passport_series: opt_text(r[16]),
        passport_number: opt_text(r[17]),
        birth_certificate: opt_text(r[18]),
        benefits: opt_text(r[19]),
        medical_notes: opt_text(r[20]),
        health_group: opt_int(r[21]),
        allergies: opt_text(r[22]),
        activities: opt_text(r[23]),
        consent_data_processing: parse_flag(r[24]),
        consent_data_processing_date: opt_text(r[25]),
        consent_photo_publication: parse_flag(r[26]),
        consent_photo_publication_date: opt_text(r[27]),
        consent_internet_access: parse_flag(r[28]),
        consent_internet_access_date: opt_text(r[29]),
    };

    let contacts = (0..INLINE_CONTACTS)
        .filter_map(|slot| {
            let base = STUDENT_COLUMNS + slot * 3;
            inline_contact(&student.student_number, r[base], r[base + 1], r[base + 2])
        })
        .collect();

    Some((student, contacts))
}

/// Legacy contacts sheet: number, full name, phone, relation.
pub fn decode_contacts_sheet(rows: &[Vec<String>]) -> Vec<ImportContact> {
    rows.iter()
        .skip(1)
        .filter_map(|cells| {
            let r = pad(cells, CONTACT_SHEET_WIDTH);
            if r[0].trim().is_empty() && r[1].trim().is_empty() {
                return None;
            }
            Some(ImportContact {
                student_number: r[0].trim().to_string(),
                full_name: r[1].trim().to_string(),
                phone: r[2].trim().to_string(),
                relation: r[3].trim().to_string(),
            })
        })
        .collect()
}

/// Whether a header row names the legacy contacts columns.
pub fn header_looks_like_contacts(header: &[String]) -> bool {
    if header.len() < CONTACT_SHEET_WIDTH {
        return false;
    }
    let h: Vec<String> = header.iter().take(4).map(|c| c.trim().to_lowercase()).collect();
    let one_of = |value: &str, options: &[&str]| options.contains(&value);

    one_of(&h[0], &["student_number", "номер дела", "номер_дела"])
        && one_of(&h[1], &["фио контакта", "contact_full_name", "фио"])
        && one_of(&h[2], &["телефон", "phone"])
        && one_of(&h[3], &["связь", "relation"])
}

/// Map common spellings to `m`/`f`; anything else passes through for validation to reject.
pub fn normalize_gender(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "м" | "муж" | "мужской" | "male" | "m" => "m".to_string(),
        "ж" | "жен" | "женский" | "female" | "f" => "f".to_string(),
        _ => raw.to_string(),
    }
}

pub fn normalize_status(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "обучается" | "зачислен" | "зачислена" | "учится" => "enrolled".to_string(),
        "переведён" | "переведен" | "переведена" => "transferred".to_string(),
        "выпущен" | "выпущена" | "окончил" | "окончила" | "выпускник" => "graduated".to_string(),
        "исключён" | "исключен" | "исключена" => "expelled".to_string(),
        _ => raw.to_string(),
    }
}

/// Yes/no token in Russian or English. Blank or unrecognised text is `None`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "t" | "y" | "yes" | "да" | "д" | "истина" => Some(true),
        "false" | "0" | "f" | "n" | "no" | "нет" | "н" | "ложь" => Some(false),
        _ => None,
    }
}

fn inline_contact(student_number: &str, full_name: &str, phone: &str, relation: &str) -> Option<ImportContact> {
    let (full_name, phone, relation) = (full_name.trim(), phone.trim(), relation.trim());
    if full_name.is_empty() && phone.is_empty() && relation.is_empty() {
        return None;
    }
    Some(ImportContact {
        student_number: student_number.to_string(),
        full_name: full_name.to_string(),
        phone: phone.to_string(),
        relation: relation.to_string(),
    })
}

fn pad(cells: &[String], width: usize) -> Vec<&str> {
    let mut out: Vec<&str> = cells.iter().map(String::as_str).collect();
    if out.len() < width {
        out.resize(width, "");
    }
    out
}

fn opt_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// Unparseable numbers become 0 and fail validation downstream.
/// Unparseable or out-of-range cells become zero and fail validation later.
fn int_or_zero<T: FromStr + Default>(raw: &str) -> T {
    raw.trim().parse().unwrap_or_default()
}

fn opt_int(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}
