use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::database::models::{
    ConsentsUpsert, DocumentsUpsert, EmergencyContact, MedicalUpsert, NewContact, NewStudentCore,
    StudentConsents, StudentCore, StudentDocuments, StudentFilters, StudentMedical,
};
use crate::database::store::{StoreError, StudentStore};

const CORE_COLUMNS: &str = "id, student_number, last_name, first_name, middle_name, birth_date, gender, \
     citizenship, school_id, class_label, admission_year, status, reg_address, fact_address, \
     student_phone, student_email, created_at, updated_at, deleted_at, created_by, updated_by";

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed student store. Expects the tables from `sql/schema.sql`.
#[derive(Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn core_from_row(row: &PgRow) -> Result<StudentCore, StoreError> {
    let gender: String = row.try_get("gender")?;
    let status: String = row.try_get("status")?;

    Ok(StudentCore {
        id: row.try_get("id")?,
        student_number: row.try_get("student_number")?,
        last_name: row.try_get("last_name")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        birth_date: row.try_get("birth_date")?,
        gender: gender.parse().map_err(|e| StoreError::InvalidData(format!("{}", e)))?,
        citizenship: row.try_get("citizenship")?,
        school_id: row.try_get("school_id")?,
        class_label: row.try_get("class_label")?,
        admission_year: row.try_get("admission_year")?,
        status: status.parse().map_err(|e| StoreError::InvalidData(format!("{}", e)))?,
        reg_address: row.try_get("reg_address")?,
        fact_address: row.try_get("fact_address")?,
        student_phone: row.try_get("student_phone")?,
        student_email: row.try_get("student_email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

/// Translate the partial unique index on live student numbers into a domain error.
fn map_write_error(err: sqlx::Error, student_number: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::DuplicateStudentNumber(student_number.to_string())
        }
        _ => StoreError::Sqlx(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &StudentFilters) {
    builder.push(" WHERE deleted_at IS NULL");

    if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        builder
            .push(" AND (last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR COALESCE(middle_name, '') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(school_id) = filters.school_id {
        builder.push(" AND school_id = ").push_bind(school_id);
    }
    if let Some(class_label) = &filters.class_label {
        builder.push(" AND class_label = ").push_bind(class_label.clone());
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filters.admission_year_from {
        builder.push(" AND admission_year >= ").push_bind(from);
    }
    if let Some(to) = filters.admission_year_to {
        builder.push(" AND admission_year <= ").push_bind(to);
    }
    if let Some(from) = filters.birth_date_from {
        builder.push(" AND birth_date >= ").push_bind(from);
    }
    if let Some(to) = filters.birth_date_to {
        builder.push(" AND birth_date <= ").push_bind(to);
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_core(&self, core: &NewStudentCore, created_by: i64) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO students (
                student_number, last_name, first_name, middle_name, birth_date, gender,
                citizenship, school_id, class_label, admission_year, status,
                reg_address, fact_address, student_phone, student_email, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(&core.student_number)
        .bind(&core.last_name)
        .bind(&core.first_name)
        .bind(&core.middle_name)
        .bind(core.birth_date)
        .bind(core.gender.as_str())
        .bind(&core.citizenship)
        .bind(core.school_id)
        .bind(&core.class_label)
        .bind(core.admission_year)
        .bind(core.status.as_str())
        .bind(&core.reg_address)
        .bind(&core.fact_address)
        .bind(&core.student_phone)
        .bind(&core.student_email)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &core.student_number))?;

        Ok(id)
    }

    async fn update_core(&self, id: i64, core: &NewStudentCore, updated_by: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE students SET
                student_number = $2, last_name = $3, first_name = $4, middle_name = $5,
                birth_date = $6, gender = $7, citizenship = $8, school_id = $9,
                class_label = $10, admission_year = $11, status = $12,
                reg_address = $13, fact_address = $14, student_phone = $15, student_email = $16,
                updated_by = $17, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&core.student_number)
        .bind(&core.last_name)
        .bind(&core.first_name)
        .bind(&core.middle_name)
        .bind(core.birth_date)
        .bind(core.gender.as_str())
        .bind(&core.citizenship)
        .bind(core.school_id)
        .bind(&core.class_label)
        .bind(core.admission_year)
        .bind(core.status.as_str())
        .bind(&core.reg_address)
        .bind(&core.fact_address)
        .bind(&core.student_phone)
        .bind(&core.student_email)
        .bind(updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &core.student_number))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("student {}", id)));
        }
        Ok(())
    }

    async fn get_core(&self, id: i64) -> Result<Option<StudentCore>, StoreError> {
        let query = format!("SELECT {} FROM students WHERE id = $1 AND deleted_at IS NULL", CORE_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(core_from_row).transpose()
    }

    async fn soft_delete_core(&self, id: i64, deleted_by: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE students SET deleted_at = now(), updated_at = now(), updated_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_id_by_student_number(&self, student_number: &str) -> Result<Option<i64>, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM students WHERE student_number = $1 AND deleted_at IS NULL LIMIT 1",
        )
        .bind(student_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_cores(
        &self,
        filters: &StudentFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<StudentCore>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM students");
        push_filters(&mut count, filters);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM students", CORE_COLUMNS));
        push_filters(&mut select, filters);
        select
            .push(" ORDER BY last_name, first_name, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = select.build().fetch_all(&self.pool).await?;
        let cores = rows.iter().map(core_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((cores, total))
    }

    async fn get_documents(&self, student_id: i64) -> Result<Option<StudentDocuments>, StoreError> {
        let docs = sqlx::query_as::<_, StudentDocuments>(
            "SELECT student_id, snils, passport_series, passport_number, birth_certificate, updated_at \
             FROM student_documents WHERE student_id = $1 \
             AND EXISTS (SELECT 1 FROM students WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(docs)
    }

    async fn upsert_documents(&self, docs: &DocumentsUpsert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO student_documents (student_id, snils, passport_series, passport_number, birth_certificate, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (student_id) DO UPDATE SET
                snils = EXCLUDED.snils,
                passport_series = EXCLUDED.passport_series,
                passport_number = EXCLUDED.passport_number,
                birth_certificate = EXCLUDED.birth_certificate,
                updated_at = now()
            "#,
        )
        .bind(docs.student_id)
        .bind(&docs.snils)
        .bind(&docs.passport_series)
        .bind(&docs.passport_number)
        .bind(&docs.birth_certificate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn documents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentDocuments>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, StudentDocuments>(
            "SELECT student_id, snils, passport_series, passport_number, birth_certificate, updated_at \
             FROM student_documents WHERE student_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|d| (d.student_id, d)).collect())
    }

    async fn get_medical(&self, student_id: i64) -> Result<Option<StudentMedical>, StoreError> {
        let medical = sqlx::query_as::<_, StudentMedical>(
            "SELECT student_id, benefits, medical_notes, health_group, allergies, activities, updated_at \
             FROM student_medical WHERE student_id = $1 \
             AND EXISTS (SELECT 1 FROM students WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(medical)
    }

    async fn upsert_medical(&self, medical: &MedicalUpsert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO student_medical (student_id, benefits, medical_notes, health_group, allergies, activities, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (student_id) DO UPDATE SET
                benefits = EXCLUDED.benefits,
                medical_notes = EXCLUDED.medical_notes,
                health_group = EXCLUDED.health_group,
                allergies = EXCLUDED.allergies,
                activities = EXCLUDED.activities,
                updated_at = now()
            "#,
        )
        .bind(medical.student_id)
        .bind(&medical.benefits)
        .bind(&medical.medical_notes)
        .bind(medical.health_group)
        .bind(&medical.allergies)
        .bind(&medical.activities)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn medical_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentMedical>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, StudentMedical>(
            "SELECT student_id, benefits, medical_notes, health_group, allergies, activities, updated_at \
             FROM student_medical WHERE student_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|m| (m.student_id, m)).collect())
    }

    async fn get_consents(&self, student_id: i64) -> Result<Option<StudentConsents>, StoreError> {
        let consents = sqlx::query_as::<_, StudentConsents>(
            "SELECT student_id, consent_data_processing, consent_data_processing_date, \
             consent_photo_publication, consent_photo_publication_date, \
             consent_internet_access, consent_internet_access_date, updated_at \
             FROM student_consents WHERE student_id = $1 \
             AND EXISTS (SELECT 1 FROM students WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(consents)
    }

    async fn upsert_consents(&self, consents: &ConsentsUpsert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO student_consents (
                student_id,
                consent_data_processing, consent_data_processing_date,
                consent_photo_publication, consent_photo_publication_date,
                consent_internet_access, consent_internet_access_date,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (student_id) DO UPDATE SET
                consent_data_processing = EXCLUDED.consent_data_processing,
                consent_data_processing_date = EXCLUDED.consent_data_processing_date,
                consent_photo_publication = EXCLUDED.consent_photo_publication,
                consent_photo_publication_date = EXCLUDED.consent_photo_publication_date,
                consent_internet_access = EXCLUDED.consent_internet_access,
                consent_internet_access_date = EXCLUDED.consent_internet_access_date,
                updated_at = now()
            "#,
        )
        .bind(consents.student_id)
        .bind(consents.consent_data_processing)
        .bind(consents.consent_data_processing_date)
        .bind(consents.consent_photo_publication)
        .bind(consents.consent_photo_publication_date)
        .bind(consents.consent_internet_access)
        .bind(consents.consent_internet_access_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentConsents>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, StudentConsents>(
            "SELECT student_id, consent_data_processing, consent_data_processing_date, \
             consent_photo_publication, consent_photo_publication_date, \
             consent_internet_access, consent_internet_access_date, updated_at \
             FROM student_consents WHERE student_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|c| (c.student_id, c)).collect())
    }

    async fn add_contact(&self, student_id: i64, contact: &NewContact) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO student_emergency_contacts (student_id, full_name, phone, relation) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(student_id)
        .bind(&contact.full_name)
        .bind(&contact.phone)
        .bind(&contact.relation)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, StoreError> {
        let contact = sqlx::query_as::<_, EmergencyContact>(
            "SELECT id, student_id, full_name, phone, relation, created_at \
             FROM student_emergency_contacts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contact)
    }

    async fn delete_contact(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM student_emergency_contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_contacts_for_student(&self, student_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM student_emergency_contacts WHERE student_id = $1")
            .bind(student_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_contacts(&self, student_id: i64) -> Result<Vec<EmergencyContact>, StoreError> {
        let contacts = sqlx::query_as::<_, EmergencyContact>(
            "SELECT id, student_id, full_name, phone, relation, created_at \
             FROM student_emergency_contacts WHERE student_id = $1 \
             AND EXISTS (SELECT 1 FROM students WHERE id = $1 AND deleted_at IS NULL) ORDER BY id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }

    async fn contacts_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<EmergencyContact>>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, EmergencyContact>(
            "SELECT id, student_id, full_name, phone, relation, created_at \
             FROM student_emergency_contacts WHERE student_id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<EmergencyContact>> = HashMap::new();
        for contact in rows {
            grouped.entry(contact.student_id).or_default().push(contact);
        }
        Ok(grouped)
    }
}
