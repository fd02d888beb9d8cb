//! Field rules for student records.
//!
//! Messages are user-facing and returned verbatim in import results and
//! API validation errors.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::dates::add_years_months;
use crate::database::models::StudentCoreInput;
use crate::types::StudentStatus;

static CLASS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,2}[А-ЯA-Z]$").expect("class label pattern"));
static SNILS_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}-[0-9]{3}-[0-9]{3}[\t\n\x0C\r ][0-9]{2}$").expect("snils pattern"));
static SNILS_PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{11}$").expect("snils pattern"));
static PASSPORT_SERIES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("passport series pattern"));
static PASSPORT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6}$").expect("passport number pattern"));

pub const MIN_ADMISSION_YEAR: i32 = 1990;

/// Age at which a passport replaces the birth certificate: 14 years and 1 month.
pub const PASSPORT_AGE_YEARS: i32 = 14;
pub const PASSPORT_AGE_EXTRA_MONTHS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("student_number обязателен")]
    StudentNumberRequired,

    #[error("Фамилия и Имя обязательны")]
    NameRequired,

    #[error("Дата рождения обязательна")]
    BirthDateRequired,

    #[error("Пол должен быть m или f")]
    InvalidGender,

    #[error("school_id обязателен")]
    SchoolRequired,

    #[error("Класс должен быть вида 7А/11Б")]
    InvalidClassLabel,

    #[error("Некорректный год поступления")]
    InvalidAdmissionYear,

    #[error("Адрес регистрации и проживания обязательны")]
    AddressRequired,

    #[error("Некорректный статус")]
    InvalidStatus,

    #[error("СНИЛС обязателен и должен быть в формате 123-456-789 00 или 11 цифр")]
    InvalidSnils,

    #[error("Паспорт обязателен (серия 4 цифры, номер 6 цифр) с 14 лет и 1 месяца")]
    PassportRequired,

    #[error("Свидетельство о рождении обязательно для младше 14 лет")]
    BirthCertificateRequired,
}

impl ValidationError {
    /// Field the rule is attached to, for API field error maps.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::StudentNumberRequired => "student_number",
            ValidationError::NameRequired => "last_name",
            ValidationError::BirthDateRequired => "birth_date",
            ValidationError::InvalidGender => "gender",
            ValidationError::SchoolRequired => "school_id",
            ValidationError::InvalidClassLabel => "class_label",
            ValidationError::InvalidAdmissionYear => "admission_year",
            ValidationError::AddressRequired => "reg_address",
            ValidationError::InvalidStatus => "status",
            ValidationError::InvalidSnils => "snils",
            ValidationError::PassportRequired => "passport_number",
            ValidationError::BirthCertificateRequired => "birth_certificate",
        }
    }
}

/// Check the core identity fields, reporting only the first failing rule.
pub fn validate_core(input: &StudentCoreInput) -> Result<(), ValidationError> {
    validate_core_in_year(input, Utc::now().year())
}

pub fn validate_core_in_year(input: &StudentCoreInput, current_year: i32) -> Result<(), ValidationError> {
    if input.last_name.is_empty() || input.first_name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if input.birth_date.is_empty() {
        return Err(ValidationError::BirthDateRequired);
    }
    if input.gender != "m" && input.gender != "f" {
        return Err(ValidationError::InvalidGender);
    }
    if input.school_id <= 0 {
        return Err(ValidationError::SchoolRequired);
    }
    if !CLASS_LABEL.is_match(&input.class_label) {
        return Err(ValidationError::InvalidClassLabel);
    }
    if input.admission_year < MIN_ADMISSION_YEAR || input.admission_year > current_year + 1 {
        return Err(ValidationError::InvalidAdmissionYear);
    }
    if input.reg_address.is_empty() || input.fact_address.is_empty() {
        return Err(ValidationError::AddressRequired);
    }
    if input.status.parse::<StudentStatus>().is_err() {
        return Err(ValidationError::InvalidStatus);
    }
    Ok(())
}

/// Identity documents supplied for the age-conditional check.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentSet<'a> {
    pub snils: Option<&'a str>,
    pub passport_series: Option<&'a str>,
    pub passport_number: Option<&'a str>,
    pub birth_certificate: Option<&'a str>,
}

pub fn validate_documents(birth_date: NaiveDate, docs: &DocumentSet<'_>) -> Result<(), ValidationError> {
    validate_documents_at(Utc::now(), birth_date, docs)
}

/// SNILS is always required. From 14 years and 1 month of age (inclusive)
/// a passport is required, before that a birth certificate.
pub fn validate_documents_at(
    now: DateTime<Utc>,
    birth_date: NaiveDate,
    docs: &DocumentSet<'_>,
) -> Result<(), ValidationError> {
    let snils_ok = docs
        .snils
        .is_some_and(|s| SNILS_GROUPED.is_match(s) || SNILS_PLAIN.is_match(s));
    if !snils_ok {
        return Err(ValidationError::InvalidSnils);
    }

    if requires_passport(now, birth_date) {
        let series_ok = docs.passport_series.is_some_and(|s| PASSPORT_SERIES.is_match(s));
        let number_ok = docs.passport_number.is_some_and(|n| PASSPORT_NUMBER.is_match(n));
        if !(series_ok && number_ok) {
            return Err(ValidationError::PassportRequired);
        }
    } else if docs.birth_certificate.map_or(true, str::is_empty) {
        return Err(ValidationError::BirthCertificateRequired);
    }
    Ok(())
}

/// Whether `now` is at or past the passport threshold for this birth date.
pub fn requires_passport(now: DateTime<Utc>, birth_date: NaiveDate) -> bool {
    match add_years_months(birth_date, PASSPORT_AGE_YEARS, PASSPORT_AGE_EXTRA_MONTHS) {
        Some(threshold) => now.date_naive() >= threshold,
        // out of chrono's range: treat as far past
        None => true,
    }
}
