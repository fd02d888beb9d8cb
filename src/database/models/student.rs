use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Gender, StudentStatus};
use crate::validation::ValidationError;

/// Core identity record of a student. Soft-deleted rows keep `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentCore {
    pub id: i64,
    pub student_number: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub citizenship: Option<String>,
    pub school_id: i64,
    pub class_label: String,
    pub admission_year: i32,
    pub status: StudentStatus,
    pub reg_address: String,
    pub fact_address: String,
    pub student_phone: Option<String>,
    pub student_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub updated_by: Option<i64>,
}

impl StudentCore {
    pub fn full_name(&self) -> String {
        let mut name = format!("{} {}", self.last_name, self.first_name);
        if let Some(middle) = self.middle_name.as_deref().filter(|m| !m.is_empty()) {
            name.push(' ');
            name.push_str(middle);
        }
        name
    }

    pub fn to_list_item(&self) -> StudentListItem {
        StudentListItem {
            id: self.id,
            student_number: self.student_number.clone(),
            full_name: self.full_name(),
            birth_date: self.birth_date,
            gender: self.gender,
            school_id: self.school_id,
            class_label: self.class_label.clone(),
            admission_year: self.admission_year,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Unvalidated core fields as they arrive from a form or a spreadsheet row.
/// Gender and status are still free text here; `birth_date` is any
/// date form accepted by [`crate::dates::parse_loose_date`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentCoreInput {
    pub student_number: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub birth_date: String,
    pub gender: String,
    pub citizenship: Option<String>,
    pub school_id: i64,
    pub class_label: String,
    pub admission_year: i32,
    pub status: String,
    pub reg_address: String,
    pub fact_address: String,
    pub student_phone: Option<String>,
    pub student_email: Option<String>,
}

/// Core fields after validation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudentCore {
    pub student_number: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub citizenship: Option<String>,
    pub school_id: i64,
    pub class_label: String,
    pub admission_year: i32,
    pub status: StudentStatus,
    pub reg_address: String,
    pub fact_address: String,
    pub student_phone: Option<String>,
    pub student_email: Option<String>,
}

impl NewStudentCore {
    /// Combine checked input with its already-parsed birth date.
    pub fn from_input(input: &StudentCoreInput, birth_date: NaiveDate) -> Result<Self, ValidationError> {
        let gender = input.gender.parse().map_err(|_| ValidationError::InvalidGender)?;
        let status = input.status.parse().map_err(|_| ValidationError::InvalidStatus)?;

        Ok(Self {
            student_number: input.student_number.clone(),
            last_name: input.last_name.clone(),
            first_name: input.first_name.clone(),
            middle_name: input.middle_name.clone(),
            birth_date,
            gender,
            citizenship: input.citizenship.clone(),
            school_id: input.school_id,
            class_label: input.class_label.clone(),
            admission_year: input.admission_year,
            status,
            reg_address: input.reg_address.clone(),
            fact_address: input.fact_address.clone(),
            student_phone: input.student_phone.clone(),
            student_email: input.student_email.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentListItem {
    pub id: i64,
    pub student_number: String,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub school_id: i64,
    pub class_label: String,
    pub admission_year: i32,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
}

/// List/export filters. Every field is optional; set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentFilters {
    /// Case-insensitive substring of last, first or middle name.
    pub q: Option<String>,
    pub school_id: Option<i64>,
    pub class_label: Option<String>,
    pub status: Option<StudentStatus>,
    pub admission_year_from: Option<i32>,
    pub admission_year_to: Option<i32>,
    pub birth_date_from: Option<NaiveDate>,
    pub birth_date_to: Option<NaiveDate>,
}

impl StudentFilters {
    pub fn matches(&self, core: &StudentCore) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let hit = [Some(&core.last_name), Some(&core.first_name), core.middle_name.as_ref()]
                .into_iter()
                .flatten()
                .any(|part| part.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self.school_id.is_some_and(|id| id != core.school_id) {
            return false;
        }
        if self.class_label.as_deref().is_some_and(|c| c != core.class_label) {
            return false;
        }
        if self.status.is_some_and(|s| s != core.status) {
            return false;
        }
        if self.admission_year_from.is_some_and(|y| core.admission_year < y)
            || self.admission_year_to.is_some_and(|y| core.admission_year > y)
        {
            return false;
        }
        if self.birth_date_from.is_some_and(|d| core.birth_date < d)
            || self.birth_date_to.is_some_and(|d| core.birth_date > d)
        {
            return false;
        }
        true
    }
}
