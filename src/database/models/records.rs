use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudentDocuments {
    pub student_id: i64,
    pub snils: String,
    pub passport_series: Option<String>,
    pub passport_number: Option<String>,
    pub birth_certificate: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentsUpsert {
    pub student_id: i64,
    pub snils: String,
    pub passport_series: Option<String>,
    pub passport_number: Option<String>,
    pub birth_certificate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudentMedical {
    pub student_id: i64,
    pub benefits: Option<String>,
    pub medical_notes: Option<String>,
    pub health_group: Option<i32>,
    pub allergies: Option<String>,
    pub activities: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalUpsert {
    pub student_id: i64,
    pub benefits: Option<String>,
    pub medical_notes: Option<String>,
    pub health_group: Option<i32>,
    pub allergies: Option<String>,
    pub activities: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudentConsents {
    pub student_id: i64,
    pub consent_data_processing: bool,
    pub consent_data_processing_date: Option<NaiveDate>,
    pub consent_photo_publication: bool,
    pub consent_photo_publication_date: Option<NaiveDate>,
    pub consent_internet_access: bool,
    pub consent_internet_access_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentsUpsert {
    pub student_id: i64,
    pub consent_data_processing: bool,
    pub consent_data_processing_date: Option<NaiveDate>,
    pub consent_photo_publication: bool,
    pub consent_photo_publication_date: Option<NaiveDate>,
    pub consent_internet_access: bool,
    pub consent_internet_access_date: Option<NaiveDate>,
}

impl From<(&DocumentsUpsert, DateTime<Utc>)> for StudentDocuments {
    fn from((input, at): (&DocumentsUpsert, DateTime<Utc>)) -> Self {
        Self {
            student_id: input.student_id,
            snils: input.snils.clone(),
            passport_series: input.passport_series.clone(),
            passport_number: input.passport_number.clone(),
            birth_certificate: input.birth_certificate.clone(),
            updated_at: at,
        }
    }
}

impl From<(&MedicalUpsert, DateTime<Utc>)> for StudentMedical {
    fn from((input, at): (&MedicalUpsert, DateTime<Utc>)) -> Self {
        Self {
            student_id: input.student_id,
            benefits: input.benefits.clone(),
            medical_notes: input.medical_notes.clone(),
            health_group: input.health_group,
            allergies: input.allergies.clone(),
            activities: input.activities.clone(),
            updated_at: at,
        }
    }
}

impl From<(&ConsentsUpsert, DateTime<Utc>)> for StudentConsents {
    fn from((input, at): (&ConsentsUpsert, DateTime<Utc>)) -> Self {
        Self {
            student_id: input.student_id,
            consent_data_processing: input.consent_data_processing,
            consent_data_processing_date: input.consent_data_processing_date,
            consent_photo_publication: input.consent_photo_publication,
            consent_photo_publication_date: input.consent_photo_publication_date,
            consent_internet_access: input.consent_internet_access,
            consent_internet_access_date: input.consent_internet_access_date,
            updated_at: at,
        }
    }
}
