use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{
    ConsentsUpsert, DocumentsUpsert, EmergencyContact, MedicalUpsert, NewContact, NewStudentCore,
    StudentConsents, StudentCore, StudentDocuments, StudentFilters, StudentMedical,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("student_number already exists: {0}")]
    DuplicateStudentNumber(String),

    #[error("invalid stored value: {0}")]
    InvalidData(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence for the student aggregate.
///
/// Every sub-record (documents, medical, consents) has the same shape:
/// `get_*` by student id, `upsert_*` that inserts or overwrites every column,
/// and `*_by_ids` returning a map for bulk export. Contacts are a list per
/// student. Soft-deleted cores are invisible to every read.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Cheap connectivity probe for `/health`.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_core(&self, core: &NewStudentCore, created_by: i64) -> Result<i64, StoreError>;
    async fn update_core(&self, id: i64, core: &NewStudentCore, updated_by: i64) -> Result<(), StoreError>;
    async fn get_core(&self, id: i64) -> Result<Option<StudentCore>, StoreError>;
    async fn soft_delete_core(&self, id: i64, deleted_by: i64) -> Result<bool, StoreError>;
    async fn find_id_by_student_number(&self, student_number: &str) -> Result<Option<i64>, StoreError>;
    /// Matching cores ordered by name, plus the total match count before paging.
    async fn list_cores(
        &self,
        filters: &StudentFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<StudentCore>, i64), StoreError>;

    async fn get_documents(&self, student_id: i64) -> Result<Option<StudentDocuments>, StoreError>;
    async fn upsert_documents(&self, docs: &DocumentsUpsert) -> Result<(), StoreError>;
    async fn documents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentDocuments>, StoreError>;

    async fn get_medical(&self, student_id: i64) -> Result<Option<StudentMedical>, StoreError>;
    async fn upsert_medical(&self, medical: &MedicalUpsert) -> Result<(), StoreError>;
    async fn medical_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentMedical>, StoreError>;

    async fn get_consents(&self, student_id: i64) -> Result<Option<StudentConsents>, StoreError>;
    async fn upsert_consents(&self, consents: &ConsentsUpsert) -> Result<(), StoreError>;
    async fn consents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentConsents>, StoreError>;

    async fn add_contact(&self, student_id: i64, contact: &NewContact) -> Result<i64, StoreError>;
    async fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, StoreError>;
    async fn delete_contact(&self, id: i64) -> Result<bool, StoreError>;
    async fn delete_contacts_for_student(&self, student_id: i64) -> Result<u64, StoreError>;
    async fn list_contacts(&self, student_id: i64) -> Result<Vec<EmergencyContact>, StoreError>;
    async fn contacts_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<EmergencyContact>>, StoreError>;
}
