use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{ImportContact, ImportResult, ImportStudent};
use crate::auth::AccessScope;
use crate::dates::parse_loose_date;
use crate::database::models::NewStudentCore;
use crate::database::StudentStore;
use crate::services::ServiceError;
use crate::validation::{validate_core, validate_documents, ValidationError};

const SNILS_REQUIRED: &str = "СНИЛС обязателен";

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Drop a student's existing contacts before adding the imported ones.
    pub replace_contacts: bool,
    pub scope: AccessScope,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            replace_contacts: false,
            scope: AccessScope::District,
        }
    }
}

/// Applies decoded rows to the store, one independent unit per row.
///
/// Each stage writes as soon as it passes, so a failure in a later stage
/// leaves earlier stages of the same row persisted and is reported through
/// that row's `error`. A failed row never affects its neighbours.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn StudentStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(
        &self,
        rows: &[ImportStudent],
        contacts: &[ImportContact],
        actor_id: i64,
        replace_contacts: bool,
    ) -> Vec<ImportResult> {
        let options = ImportOptions {
            replace_contacts,
            ..Default::default()
        };
        self.reconcile_with(rows, contacts, actor_id, &options).await
    }

    /// Exactly one result per input row, in input order.
    pub async fn reconcile_with(
        &self,
        rows: &[ImportStudent],
        contacts: &[ImportContact],
        actor_id: i64,
        options: &ImportOptions,
    ) -> Vec<ImportResult> {
        let span = info_span!("import", batch_id = %Uuid::new_v4(), rows = rows.len(), actor_id);

        async move {
            let by_number = index_contacts(contacts);
            let mut results = Vec::with_capacity(rows.len());

            for (index, row) in rows.iter().enumerate() {
                let row_contacts = by_number
                    .get(row.student_number.trim())
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                let mut result = ImportResult::new(index + 2, &row.student_number);
                if let Err(message) = self.apply_row(row, row_contacts, actor_id, options, &mut result).await {
                    warn!(row = result.row, student_number = %row.student_number, error = %message, "import row failed");
                    result.error = Some(message);
                }
                results.push(result);
            }

            let created = results.iter().filter(|r| r.created).count();
            let updated = results.iter().filter(|r| r.updated).count();
            let failed = results.iter().filter(|r| !r.is_ok()).count();
            info!(created, updated, failed, "import batch finished");

            results
        }
        .instrument(span)
        .await
    }

    async fn apply_row(
        &self,
        row: &ImportStudent,
        contacts: &[&ImportContact],
        actor_id: i64,
        options: &ImportOptions,
        result: &mut ImportResult,
    ) -> Result<(), String> {
        if row.student_number.trim().is_empty() {
            return Err(ValidationError::StudentNumberRequired.to_string());
        }

        let core_input = row.core_input();
        validate_core(&core_input).map_err(|e| e.to_string())?;

        let birth_date = parse_loose_date(&row.birth_date)
            .map_err(|e| ServiceError::invalid_date("birth_date")(e).to_string())?;

        if row.snils.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(SNILS_REQUIRED.to_string());
        }

        let documents = row.documents_input();
        validate_documents(birth_date, &documents.as_document_set()).map_err(|e| e.to_string())?;

        let core = NewStudentCore::from_input(&core_input, birth_date).map_err(|e| e.to_string())?;
        if !options.scope.permits(core.school_id) {
            return Err(format!("школа {} недоступна для этой учётной записи", core.school_id));
        }

        let existing = self
            .store
            .find_id_by_student_number(&row.student_number)
            .await
            .map_err(|e| e.to_string())?;

        let student_id = match existing {
            None => {
                let id = self.store.create_core(&core, actor_id).await.map_err(|e| e.to_string())?;
                result.student_id = Some(id);
                result.created = true;
                debug!(student_id = id, "created student from import");
                id
            }
            Some(id) => {
                if let Some(own) = options.scope.school_filter() {
                    let stored = self.store.get_core(id).await.map_err(|e| e.to_string())?;
                    if stored.is_some_and(|s| s.school_id != own) {
                        return Err(format!("ученик {} числится в другой школе", row.student_number));
                    }
                }
                result.student_id = Some(id);
                self.store
                    .update_core(id, &core, actor_id)
                    .await
                    .map_err(|e| e.to_string())?;
                result.updated = true;
                debug!(student_id = id, "updated student from import");
                id
            }
        };

        self.store
            .upsert_documents(&documents.into_upsert(student_id))
            .await
            .map_err(|e| format!("documents: {}", e))?;

        self.store
            .upsert_medical(&row.medical_input().into_upsert(student_id))
            .await
            .map_err(|e| format!("medical: {}", e))?;

        let consents = row
            .consents_input()
            .into_upsert(student_id)
            .map_err(|e| format!("consents: {}", e))?;
        self.store
            .upsert_consents(&consents)
            .await
            .map_err(|e| format!("consents: {}", e))?;

        if contacts.is_empty() {
            return Ok(());
        }

        if options.replace_contacts {
            self.store
                .delete_contacts_for_student(student_id)
                .await
                .map_err(|e| format!("contacts delete: {}", e))?;
        }

        let mut first_failure = None;
        for contact in contacts {
            if let Err(e) = self.store.add_contact(student_id, &contact.to_new_contact()).await {
                first_failure.get_or_insert_with(|| format!("contacts add: {}", e));
            }
        }
        match first_failure {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}

fn index_contacts(contacts: &[ImportContact]) -> HashMap<&str, Vec<&ImportContact>> {
    let mut by_number: HashMap<&str, Vec<&ImportContact>> = HashMap::new();
    for contact in contacts {
        let number = contact.student_number.trim();
        if number.is_empty() {
            continue;
        }
        by_number.entry(number).or_default().push(contact);
    }
    by_number
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{
        ConsentsUpsert, DocumentsUpsert, EmergencyContact, MedicalUpsert, NewContact, StudentConsents,
        StudentCore, StudentDocuments, StudentFilters, StudentMedical,
    };
    use crate::database::{MemoryStudentStore, StoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn row(number: &str) -> ImportStudent {
        ImportStudent {
            student_number: number.to_string(),
            last_name: "Иванов".to_string(),
            first_name: "Иван".to_string(),
            birth_date: "01.09.2018".to_string(),
            gender: "m".to_string(),
            school_id: 3,
            class_label: "7А".to_string(),
            admission_year: 2025,
            status: "enrolled".to_string(),
            reg_address: "ул. Ленина, 1".to_string(),
            fact_address: "ул. Ленина, 1".to_string(),
            snils: Some("123-456-789 01".to_string()),
            birth_certificate: Some("II-АБ 123456".to_string()),
            ..Default::default()
        }
    }

    fn contact(number: &str, name: &str) -> ImportContact {
        ImportContact {
            student_number: number.to_string(),
            full_name: name.to_string(),
            phone: "+7 900 000-00-00".to_string(),
            relation: "мать".to_string(),
        }
    }

    /// Delegates to the memory store but refuses every medical upsert.
    struct MedicalOutage(MemoryStudentStore);

    #[async_trait]
    impl StudentStore for MedicalOutage {
        async fn create_core(&self, core: &NewStudentCore, by: i64) -> Result<i64, StoreError> {
            self.0.create_core(core, by).await
        }
        async fn update_core(&self, id: i64, core: &NewStudentCore, by: i64) -> Result<(), StoreError> {
            self.0.update_core(id, core, by).await
        }
        async fn get_core(&self, id: i64) -> Result<Option<StudentCore>, StoreError> {
            self.0.get_core(id).await
        }
        async fn soft_delete_core(&self, id: i64, by: i64) -> Result<bool, StoreError> {
            self.0.soft_delete_core(id, by).await
        }
        async fn find_id_by_student_number(&self, number: &str) -> Result<Option<i64>, StoreError> {
            self.0.find_id_by_student_number(number).await
        }
        async fn list_cores(
            &self,
            filters: &StudentFilters,
            limit: i64,
            offset: i64,
        ) -> Result<(Vec<StudentCore>, i64), StoreError> {
            self.0.list_cores(filters, limit, offset).await
        }
        async fn get_documents(&self, id: i64) -> Result<Option<StudentDocuments>, StoreError> {
            self.0.get_documents(id).await
        }
        async fn upsert_documents(&self, docs: &DocumentsUpsert) -> Result<(), StoreError> {
            self.0.upsert_documents(docs).await
        }
        async fn documents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentDocuments>, StoreError> {
            self.0.documents_by_ids(ids).await
        }
        async fn get_medical(&self, id: i64) -> Result<Option<StudentMedical>, StoreError> {
            self.0.get_medical(id).await
        }
        async fn upsert_medical(&self, _medical: &MedicalUpsert) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("medical table locked".into()))
        }
        async fn medical_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentMedical>, StoreError> {
            self.0.medical_by_ids(ids).await
        }
        async fn get_consents(&self, id: i64) -> Result<Option<StudentConsents>, StoreError> {
            self.0.get_consents(id).await
        }
        async fn upsert_consents(&self, consents: &ConsentsUpsert) -> Result<(), StoreError> {
            self.0.upsert_consents(consents).await
        }
        async fn consents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentConsents>, StoreError> {
            self.0.consents_by_ids(ids).await
        }
        async fn add_contact(&self, id: i64, contact: &NewContact) -> Result<i64, StoreError> {
            self.0.add_contact(id, contact).await
        }
        async fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, StoreError> {
            self.0.get_contact(id).await
        }
        async fn delete_contact(&self, id: i64) -> Result<bool, StoreError> {
            self.0.delete_contact(id).await
        }
        async fn delete_contacts_for_student(&self, id: i64) -> Result<u64, StoreError> {
            self.0.delete_contacts_for_student(id).await
        }
        async fn list_contacts(&self, id: i64) -> Result<Vec<EmergencyContact>, StoreError> {
            self.0.list_contacts(id).await
        }
        async fn contacts_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<EmergencyContact>>, StoreError> {
            self.0.contacts_by_ids(ids).await
        }
    }

    #[tokio::test]
    async fn later_stage_failure_keeps_earlier_writes() {
        let store = Arc::new(MedicalOutage(MemoryStudentStore::new()));
        let reconciler = Reconciler::new(store.clone());

        let results = reconciler.reconcile(&[row("A1")], &[], 1, false).await;
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.created);
        assert!(result.error.as_deref().unwrap().starts_with("medical: "));

        let id = result.student_id.unwrap();
        assert!(store.get_core(id).await.unwrap().is_some());
        assert!(store.get_documents(id).await.unwrap().is_some());
        assert!(store.get_consents(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_snils_rejects_before_any_write() {
        let store = Arc::new(MemoryStudentStore::new());
        let reconciler = Reconciler::new(store.clone());

        let mut bad = row("A1");
        bad.snils = Some("  ".into());
        let results = reconciler.reconcile(&[bad], &[], 1, false).await;

        assert_eq!(results[0].error.as_deref(), Some(SNILS_REQUIRED));
        assert!(!results[0].created);
        assert_eq!(store.student_count().await, 0);
    }

    #[tokio::test]
    async fn school_scope_rejects_foreign_rows() {
        let store = Arc::new(MemoryStudentStore::new());
        let reconciler = Reconciler::new(store.clone());
        let options = ImportOptions {
            replace_contacts: false,
            scope: AccessScope::School(4),
        };

        let results = reconciler.reconcile_with(&[row("A1")], &[], 1, &options).await;
        assert!(results[0].error.is_some());
        assert_eq!(results[0].student_id, None);
        assert_eq!(store.student_count().await, 0);
    }

    #[tokio::test]
    async fn foreign_student_number_does_not_leak_its_id() {
        let store = Arc::new(MemoryStudentStore::new());
        let reconciler = Reconciler::new(store.clone());
        let created = reconciler.reconcile(&[row("A1")], &[], 1, false).await;
        assert!(created[0].created);

        let options = ImportOptions {
            replace_contacts: false,
            scope: AccessScope::School(4),
        };
        let moved = ImportStudent { school_id: 4, ..row("A1") };
        let results = reconciler.reconcile_with(&[moved], &[], 2, &options).await;

        assert_eq!(results[0].error.as_deref(), Some("ученик A1 числится в другой школе"));
        assert_eq!(results[0].student_id, None);
        assert!(!results[0].updated);

        let stored = store.get_core(created[0].student_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.school_id, 3);
    }

    #[tokio::test]
    async fn blank_numbered_contacts_are_ignored() {
        let store = Arc::new(MemoryStudentStore::new());
        let reconciler = Reconciler::new(store.clone());

        let contacts = vec![contact("A1", "Мама"), contact("", "Никто")];
        let results = reconciler.reconcile(&[row("A1")], &contacts, 1, false).await;

        let id = results[0].student_id.unwrap();
        let stored = store.list_contacts(id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].full_name, "Мама");
    }

    #[test]
    fn result_serializes_null_error() {
        let value = serde_json::to_value(ImportResult::new(2, "A1")).unwrap();
        assert_eq!(value["row"], 2);
        assert!(value["error"].is_null());
        assert!(value.get("student_id").is_none());
    }
}
