pub mod decoder;
pub mod reconciler;
pub mod workbook;

use serde::{Deserialize, Serialize};

use crate::database::models::{NewContact, StudentCoreInput};
use crate::services::student_service::{ConsentsInput, DocumentsInput, MedicalInput};

pub use decoder::{decode_contacts_sheet, decode_row, decode_students_sheet};
pub use reconciler::{ImportOptions, Reconciler};
pub use workbook::{parse_import_workbook, DecodedWorkbook, WorkbookError};

/// One flat spreadsheet row: core fields plus every sub-record column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportStudent {
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

    pub snils: Option<String>,
    pub passport_series: Option<String>,
    pub passport_number: Option<String>,
    pub birth_certificate: Option<String>,

    pub benefits: Option<String>,
    pub medical_notes: Option<String>,
    pub health_group: Option<i32>,
    pub allergies: Option<String>,
    pub activities: Option<String>,

    pub consent_data_processing: Option<bool>,
    pub consent_data_processing_date: Option<String>,
    pub consent_photo_publication: Option<bool>,
    pub consent_photo_publication_date: Option<String>,
    pub consent_internet_access: Option<bool>,
    pub consent_internet_access_date: Option<String>,
}

impl ImportStudent {
    pub fn core_input(&self) -> StudentCoreInput {
        StudentCoreInput {
            student_number: self.student_number.clone(),
            last_name: self.last_name.clone(),
            first_name: self.first_name.clone(),
            middle_name: self.middle_name.clone(),
            birth_date: self.birth_date.clone(),
            gender: self.gender.clone(),
            citizenship: self.citizenship.clone(),
            school_id: self.school_id,
            class_label: self.class_label.clone(),
            admission_year: self.admission_year,
            status: self.status.clone(),
            reg_address: self.reg_address.clone(),
            fact_address: self.fact_address.clone(),
            student_phone: self.student_phone.clone(),
            student_email: self.student_email.clone(),
        }
    }

    pub fn documents_input(&self) -> DocumentsInput {
        DocumentsInput {
            snils: self.snils.clone(),
            passport_series: self.passport_series.clone(),
            passport_number: self.passport_number.clone(),
            birth_certificate: self.birth_certificate.clone(),
        }
    }

    pub fn medical_input(&self) -> MedicalInput {
        MedicalInput {
            benefits: self.benefits.clone(),
            medical_notes: self.medical_notes.clone(),
            health_group: self.health_group,
            allergies: self.allergies.clone(),
            activities: self.activities.clone(),
        }
    }

    pub fn consents_input(&self) -> ConsentsInput {
        ConsentsInput {
            consent_data_processing: self.consent_data_processing,
            consent_data_processing_date: self.consent_data_processing_date.clone(),
            consent_photo_publication: self.consent_photo_publication,
            consent_photo_publication_date: self.consent_photo_publication_date.clone(),
            consent_internet_access: self.consent_internet_access,
            consent_internet_access_date: self.consent_internet_access_date.clone(),
        }
    }
}

/// Emergency contact keyed by the owning student's number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportContact {
    pub student_number: String,
    pub full_name: String,
    pub phone: String,
    pub relation: String,
}

impl ImportContact {
    pub fn to_new_contact(&self) -> NewContact {
        NewContact {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            relation: self.relation.clone(),
        }
    }
}

/// Outcome of a single input row. `row` is the 1-based spreadsheet row
/// (header is row 1, so the first data row is 2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub row: usize,
    pub student_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    pub created: bool,
    pub updated: bool,
    pub error: Option<String>,
}

impl ImportResult {
    pub fn new(row: usize, student_number: &str) -> Self {
        Self {
            row,
            student_number: student_number.to_string(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Batch outcome with per-row results and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub results: Vec<ImportResult>,
}

impl From<Vec<ImportResult>> for ImportReport {
    fn from(results: Vec<ImportResult>) -> Self {
        Self {
            total: results.len(),
            created: results.iter().filter(|r| r.created).count(),
            updated: results.iter().filter(|r| r.updated).count(),
            failed: results.iter().filter(|r| !r.is_ok()).count(),
            results,
        }
    }
}
