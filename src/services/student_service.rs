use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::AccessScope;
use crate::dates::{parse_loose_date, parse_optional_date, DateParseError};
use crate::database::models::{
    ConsentsUpsert, DocumentsUpsert, MedicalUpsert, NewContact, NewStudentCore, StudentCore, StudentCoreInput,
    StudentFilters, StudentPage, StudentView,
};
use crate::database::{StoreError, StudentStore};
use crate::validation::{validate_core, validate_documents, DocumentSet, ValidationError};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{field}: ожидаю ДД.ММ.ГГГГ или YYYY-MM-DD (также принимаю DD-MM-YYYY и excel-число)")]
    InvalidDate {
        field: &'static str,
        #[source]
        source: DateParseError,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn invalid_date(field: &'static str) -> impl FnOnce(DateParseError) -> Self {
        move |source| ServiceError::InvalidDate { field, source }
    }
}

/// Identity documents as submitted. Checked against the stored birth date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsInput {
    pub snils: Option<String>,
    pub passport_series: Option<String>,
    pub passport_number: Option<String>,
    pub birth_certificate: Option<String>,
}

impl DocumentsInput {
    pub fn as_document_set(&self) -> DocumentSet<'_> {
        DocumentSet {
            snils: self.snils.as_deref(),
            passport_series: self.passport_series.as_deref(),
            passport_number: self.passport_number.as_deref(),
            birth_certificate: self.birth_certificate.as_deref(),
        }
    }

    pub fn into_upsert(self, student_id: i64) -> DocumentsUpsert {
        DocumentsUpsert {
            student_id,
            snils: self.snils.unwrap_or_default(),
            passport_series: self.passport_series,
            passport_number: self.passport_number,
            birth_certificate: self.birth_certificate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicalInput {
    pub benefits: Option<String>,
    pub medical_notes: Option<String>,
    pub health_group: Option<i32>,
    pub allergies: Option<String>,
    pub activities: Option<String>,
}

impl MedicalInput {
    pub fn into_upsert(self, student_id: i64) -> MedicalUpsert {
        MedicalUpsert {
            student_id,
            benefits: self.benefits,
            medical_notes: self.medical_notes,
            health_group: self.health_group,
            allergies: self.allergies,
            activities: self.activities,
        }
    }
}

/// Consent flags with free-form dates. Unset flags are stored as `false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentsInput {
    pub consent_data_processing: Option<bool>,
    pub consent_data_processing_date: Option<String>,
    pub consent_photo_publication: Option<bool>,
    pub consent_photo_publication_date: Option<String>,
    pub consent_internet_access: Option<bool>,
    pub consent_internet_access_date: Option<String>,
}

impl ConsentsInput {
    pub fn into_upsert(self, student_id: i64) -> Result<ConsentsUpsert, ServiceError> {
        let date = |value: Option<&str>, field: &'static str| {
            parse_optional_date(value).map_err(ServiceError::invalid_date(field))
        };

        Ok(ConsentsUpsert {
            student_id,
            consent_data_processing: self.consent_data_processing.unwrap_or(false),
            consent_data_processing_date: date(
                self.consent_data_processing_date.as_deref(),
                "consent_data_processing_date",
            )?,
            consent_photo_publication: self.consent_photo_publication.unwrap_or(false),
            consent_photo_publication_date: date(
                self.consent_photo_publication_date.as_deref(),
                "consent_photo_publication_date",
            )?,
            consent_internet_access: self.consent_internet_access.unwrap_or(false),
            consent_internet_access_date: date(
                self.consent_internet_access_date.as_deref(),
                "consent_internet_access_date",
            )?,
        })
    }
}

/// Everything an export needs: cores plus their sub-records, in list order.
#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    pub total: i64,
    pub students: Vec<StudentView>,
}

/// Student aggregate operations behind the HTTP and CLI surfaces
#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn StudentStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn StudentStore> {
        Arc::clone(&self.store)
    }

    /// Load a live core the caller is allowed to touch.
    async fn scoped_core(&self, id: i64, scope: AccessScope) -> Result<StudentCore, ServiceError> {
        let core = self
            .store
            .get_core(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("student {} not found", id)))?;

        if !scope.permits(core.school_id) {
            return Err(ServiceError::Forbidden("access denied".to_string()));
        }
        Ok(core)
    }

    fn prepare_core(input: &StudentCoreInput, scope: AccessScope) -> Result<NewStudentCore, ServiceError> {
        if input.student_number.trim().is_empty() {
            return Err(ValidationError::StudentNumberRequired.into());
        }
        validate_core(input)?;
        let birth_date = parse_loose_date(&input.birth_date).map_err(ServiceError::invalid_date("birth_date"))?;
        if !scope.permits(input.school_id) {
            return Err(ServiceError::Forbidden("access denied".to_string()));
        }
        Ok(NewStudentCore::from_input(input, birth_date)?)
    }

    pub async fn create_core(
        &self,
        input: &StudentCoreInput,
        scope: AccessScope,
        actor_id: i64,
    ) -> Result<i64, ServiceError> {
        let core = Self::prepare_core(input, scope)?;
        let id = self.store.create_core(&core, actor_id).await?;
        info!(student_id = id, actor_id, "created student");
        Ok(id)
    }

    pub async fn update_core(
        &self,
        id: i64,
        input: &StudentCoreInput,
        scope: AccessScope,
        actor_id: i64,
    ) -> Result<(), ServiceError> {
        self.scoped_core(id, scope).await?;
        let core = Self::prepare_core(input, scope)?;
        self.store.update_core(id, &core, actor_id).await?;
        info!(student_id = id, actor_id, "updated student");
        Ok(())
    }

    pub async fn delete_core(&self, id: i64, scope: AccessScope, actor_id: i64) -> Result<(), ServiceError> {
        self.scoped_core(id, scope).await?;
        if !self.store.soft_delete_core(id, actor_id).await? {
            return Err(ServiceError::NotFound(format!("student {} not found", id)));
        }
        info!(student_id = id, actor_id, "soft-deleted student");
        Ok(())
    }

    /// Core plus every sub-record; sub-records never written come back as `None`.
    pub async fn aggregate_view(&self, id: i64, scope: AccessScope) -> Result<StudentView, ServiceError> {
        let core = self.scoped_core(id, scope).await?;
        let documents = self.store.get_documents(id).await?;
        let medical = self.store.get_medical(id).await?;
        let consents = self.store.get_consents(id).await?;
        let contacts = self.store.list_contacts(id).await?;

        Ok(StudentView {
            core,
            documents,
            medical,
            consents,
            contacts,
        })
    }

    pub async fn list(
        &self,
        mut filters: StudentFilters,
        limit: Option<i64>,
        offset: Option<i64>,
        scope: AccessScope,
    ) -> Result<StudentPage, ServiceError> {
        if let Some(own) = scope.school_filter() {
            filters.school_id = Some(own);
        }
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_LIMIT),
            _ => DEFAULT_PAGE_LIMIT,
        };
        let offset = offset.unwrap_or(0).max(0);

        let (cores, total) = self.store.list_cores(&filters, limit, offset).await?;
        debug!(total, returned = cores.len(), "listed students");

        Ok(StudentPage {
            items: cores.iter().map(StudentCore::to_list_item).collect(),
            total,
            limit,
            offset,
        })
    }

    pub async fn upsert_documents(
        &self,
        id: i64,
        input: DocumentsInput,
        scope: AccessScope,
    ) -> Result<(), ServiceError> {
        let core = self.scoped_core(id, scope).await?;
        validate_documents(core.birth_date, &input.as_document_set())?;
        self.store.upsert_documents(&input.into_upsert(id)).await?;
        Ok(())
    }

    pub async fn upsert_medical(&self, id: i64, input: MedicalInput, scope: AccessScope) -> Result<(), ServiceError> {
        self.scoped_core(id, scope).await?;
        self.store.upsert_medical(&input.into_upsert(id)).await?;
        Ok(())
    }

    pub async fn upsert_consents(
        &self,
        id: i64,
        input: ConsentsInput,
        scope: AccessScope,
    ) -> Result<(), ServiceError> {
        self.scoped_core(id, scope).await?;
        let consents = input.into_upsert(id)?;
        self.store.upsert_consents(&consents).await?;
        Ok(())
    }

    pub async fn add_contact(&self, id: i64, contact: &NewContact, scope: AccessScope) -> Result<i64, ServiceError> {
        self.scoped_core(id, scope).await?;
        Ok(self.store.add_contact(id, contact).await?)
    }

    pub async fn delete_contact(&self, contact_id: i64, scope: AccessScope) -> Result<(), ServiceError> {
        let contact = self
            .store
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("contact {} not found", contact_id)))?;
        self.scoped_core(contact.student_id, scope).await?;
        self.store.delete_contact(contact_id).await?;
        Ok(())
    }

    /// Collect full aggregate views for export. A non-positive or
    /// over-the-cap limit falls back to `default_limit`.
    pub async fn collect_export(
        &self,
        mut filters: StudentFilters,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
        scope: AccessScope,
    ) -> Result<ExportBundle, ServiceError> {
        if let Some(own) = scope.school_filter() {
            filters.school_id = Some(own);
        }
        let limit = match limit {
            Some(l) if l > 0 && l <= max_limit => l,
            _ => default_limit,
        };

        let (cores, total) = self.store.list_cores(&filters, limit, 0).await?;
        let ids: Vec<i64> = cores.iter().map(|c| c.id).collect();

        let mut documents = self.store.documents_by_ids(&ids).await?;
        let mut medical = self.store.medical_by_ids(&ids).await?;
        let mut consents = self.store.consents_by_ids(&ids).await?;
        let mut contacts = self.store.contacts_by_ids(&ids).await?;

        let students = cores
            .into_iter()
            .map(|core| {
                let id = core.id;
                StudentView {
                    core,
                    documents: documents.remove(&id),
                    medical: medical.remove(&id),
                    consents: consents.remove(&id),
                    contacts: contacts.remove(&id).unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        info!(total, exported = students.len(), "collected export data");
        Ok(ExportBundle { total, students })
    }
}
