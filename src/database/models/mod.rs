pub mod contact;
pub mod records;
pub mod student;

pub use contact::{EmergencyContact, NewContact};
pub use records::{
    ConsentsUpsert, DocumentsUpsert, MedicalUpsert, StudentConsents, StudentDocuments, StudentMedical,
};
pub use student::{NewStudentCore, StudentCore, StudentCoreInput, StudentFilters, StudentListItem};

use serde::Serialize;

/// Full read model of one student. Sub-records that were never written stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentView {
    pub core: StudentCore,
    pub documents: Option<StudentDocuments>,
    pub medical: Option<StudentMedical>,
    pub consents: Option<StudentConsents>,
    pub contacts: Vec<EmergencyContact>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPage {
    pub items: Vec<StudentListItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
