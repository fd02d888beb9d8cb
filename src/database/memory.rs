use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::database::models::{
    ConsentsUpsert, DocumentsUpsert, EmergencyContact, MedicalUpsert, NewContact, NewStudentCore,
    StudentConsents, StudentCore, StudentDocuments, StudentFilters, StudentMedical,
};
use crate::database::store::{StoreError, StudentStore};

#[derive(Default)]
struct MemoryState {
    next_student_id: i64,
    next_contact_id: i64,
    cores: BTreeMap<i64, StudentCore>,
    documents: HashMap<i64, StudentDocuments>,
    medical: HashMap<i64, StudentMedical>,
    consents: HashMap<i64, StudentConsents>,
    contacts: BTreeMap<i64, EmergencyContact>,
}

impl MemoryState {
    fn live_core(&self, id: i64) -> Option<&StudentCore> {
        self.cores.get(&id).filter(|c| c.deleted_at.is_none())
    }

    fn require_live(&self, id: i64) -> Result<(), StoreError> {
        match self.live_core(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("student {}", id))),
        }
    }

    fn number_taken(&self, student_number: &str, except: Option<i64>) -> bool {
        self.cores.values().any(|c| {
            c.deleted_at.is_none() && c.student_number == student_number && Some(c.id) != except
        })
    }
}

/// Process-local store used for dry-run imports and tests.
#[derive(Default)]
pub struct MemoryStudentStore {
    state: RwLock<MemoryState>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not soft-deleted) students.
    pub async fn student_count(&self) -> usize {
        let state = self.state.read().await;
        state.cores.values().filter(|c| c.deleted_at.is_none()).count()
    }
}

fn collect_by_ids<T: Clone>(source: &HashMap<i64, T>, ids: &[i64]) -> HashMap<i64, T> {
    ids.iter()
        .filter_map(|id| source.get(id).map(|v| (*id, v.clone())))
        .collect()
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn create_core(&self, core: &NewStudentCore, created_by: i64) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        if state.number_taken(&core.student_number, None) {
            return Err(StoreError::DuplicateStudentNumber(core.student_number.clone()));
        }

        state.next_student_id += 1;
        let id = state.next_student_id;
        let now = Utc::now();
        state.cores.insert(
            id,
            StudentCore {
                id,
                student_number: core.student_number.clone(),
                last_name: core.last_name.clone(),
                first_name: core.first_name.clone(),
                middle_name: core.middle_name.clone(),
                birth_date: core.birth_date,
                gender: core.gender,
                citizenship: core.citizenship.clone(),
                school_id: core.school_id,
                class_label: core.class_label.clone(),
                admission_year: core.admission_year,
                status: core.status,
                reg_address: core.reg_address.clone(),
                fact_address: core.fact_address.clone(),
                student_phone: core.student_phone.clone(),
                student_email: core.student_email.clone(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
                created_by,
                updated_by: None,
            },
        );
        Ok(id)
    }

    async fn update_core(&self, id: i64, core: &NewStudentCore, updated_by: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.require_live(id)?;
        if state.number_taken(&core.student_number, Some(id)) {
            return Err(StoreError::DuplicateStudentNumber(core.student_number.clone()));
        }

        let Some(existing) = state.cores.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("student {}", id)));
        };
        existing.student_number = core.student_number.clone();
        existing.last_name = core.last_name.clone();
        existing.first_name = core.first_name.clone();
        existing.middle_name = core.middle_name.clone();
        existing.birth_date = core.birth_date;
        existing.gender = core.gender;
        existing.citizenship = core.citizenship.clone();
        existing.school_id = core.school_id;
        existing.class_label = core.class_label.clone();
        existing.admission_year = core.admission_year;
        existing.status = core.status;
        existing.reg_address = core.reg_address.clone();
        existing.fact_address = core.fact_address.clone();
        existing.student_phone = core.student_phone.clone();
        existing.student_email = core.student_email.clone();
        existing.updated_at = Utc::now();
        existing.updated_by = Some(updated_by);
        Ok(())
    }

    async fn get_core(&self, id: i64) -> Result<Option<StudentCore>, StoreError> {
        let state = self.state.read().await;
        Ok(state.live_core(id).cloned())
    }

    async fn soft_delete_core(&self, id: i64, deleted_by: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.cores.get_mut(&id) {
            Some(core) if core.deleted_at.is_none() => {
                let now = Utc::now();
                core.deleted_at = Some(now);
                core.updated_at = now;
                core.updated_by = Some(deleted_by);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_id_by_student_number(&self, student_number: &str) -> Result<Option<i64>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .cores
            .values()
            .find(|c| c.deleted_at.is_none() && c.student_number == student_number)
            .map(|c| c.id))
    }

    async fn list_cores(
        &self,
        filters: &StudentFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<StudentCore>, i64), StoreError> {
        let state = self.state.read().await;
        let mut matched: Vec<&StudentCore> = state
            .cores
            .values()
            .filter(|c| c.deleted_at.is_none() && filters.matches(c))
            .collect();
        matched.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn get_documents(&self, student_id: i64) -> Result<Option<StudentDocuments>, StoreError> {
        let state = self.state.read().await;
        Ok(state.live_core(student_id).and(state.documents.get(&student_id)).cloned())
    }

    async fn upsert_documents(&self, docs: &DocumentsUpsert) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.require_live(docs.student_id)?;
        state.documents.insert(docs.student_id, StudentDocuments::from((docs, Utc::now())));
        Ok(())
    }

    async fn documents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentDocuments>, StoreError> {
        Ok(collect_by_ids(&self.state.read().await.documents, ids))
    }

    async fn get_medical(&self, student_id: i64) -> Result<Option<StudentMedical>, StoreError> {
        let state = self.state.read().await;
        Ok(state.live_core(student_id).and(state.medical.get(&student_id)).cloned())
    }

    async fn upsert_medical(&self, medical: &MedicalUpsert) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.require_live(medical.student_id)?;
        state.medical.insert(medical.student_id, StudentMedical::from((medical, Utc::now())));
        Ok(())
    }

    async fn medical_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentMedical>, StoreError> {
        Ok(collect_by_ids(&self.state.read().await.medical, ids))
    }

    async fn get_consents(&self, student_id: i64) -> Result<Option<StudentConsents>, StoreError> {
        let state = self.state.read().await;
        Ok(state.live_core(student_id).and(state.consents.get(&student_id)).cloned())
    }

    async fn upsert_consents(&self, consents: &ConsentsUpsert) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.require_live(consents.student_id)?;
        state.consents.insert(consents.student_id, StudentConsents::from((consents, Utc::now())));
        Ok(())
    }

    async fn consents_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, StudentConsents>, StoreError> {
        Ok(collect_by_ids(&self.state.read().await.consents, ids))
    }

    async fn add_contact(&self, student_id: i64, contact: &NewContact) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        state.require_live(student_id)?;
        state.next_contact_id += 1;
        let id = state.next_contact_id;
        state.contacts.insert(
            id,
            EmergencyContact {
                id,
                student_id,
                full_name: contact.full_name.clone(),
                phone: contact.phone.clone(),
                relation: contact.relation.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, StoreError> {
        Ok(self.state.read().await.contacts.get(&id).cloned())
    }

    async fn delete_contact(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.state.write().await.contacts.remove(&id).is_some())
    }

    async fn delete_contacts_for_student(&self, student_id: i64) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.contacts.len();
        state.contacts.retain(|_, c| c.student_id != student_id);
        Ok((before - state.contacts.len()) as u64)
    }

    async fn list_contacts(&self, student_id: i64) -> Result<Vec<EmergencyContact>, StoreError> {
        let state = self.state.read().await;
        if state.live_core(student_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(state
            .contacts
            .values()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn contacts_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<EmergencyContact>>, StoreError> {
        let state = self.state.read().await;
        let mut grouped: HashMap<i64, Vec<EmergencyContact>> = HashMap::new();
        for contact in state.contacts.values().filter(|c| ids.contains(&c.student_id)) {
            grouped.entry(contact.student_id).or_default().push(contact.clone());
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, StudentStatus};
    use chrono::NaiveDate;

    fn core(number: &str) -> NewStudentCore {
        NewStudentCore {
            student_number: number.to_string(),
            last_name: "Смирнова".into(),
            first_name: "Анна".into(),
            middle_name: None,
            birth_date: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(),
            gender: Gender::F,
            citizenship: None,
            school_id: 3,
            class_label: "6Б".into(),
            admission_year: 2019,
            status: StudentStatus::Enrolled,
            reg_address: "a".into(),
            fact_address: "b".into(),
            student_phone: None,
            student_email: None,
        }
    }

    #[tokio::test]
    async fn soft_deleted_students_free_their_number() {
        let store = MemoryStudentStore::new();
        let id = store.create_core(&core("S-1"), 1).await.unwrap();
        assert!(matches!(
            store.create_core(&core("S-1"), 1).await,
            Err(StoreError::DuplicateStudentNumber(_))
        ));

        assert!(store.soft_delete_core(id, 2).await.unwrap());
        assert_eq!(store.find_id_by_student_number("S-1").await.unwrap(), None);
        assert!(store.get_core(id).await.unwrap().is_none());

        let reborn = store.create_core(&core("S-1"), 1).await.unwrap();
        assert_ne!(reborn, id);
    }

    #[tokio::test]
    async fn soft_deleted_students_hide_their_sub_records() {
        let store = MemoryStudentStore::new();
        let id = store.create_core(&core("S-5"), 1).await.unwrap();
        store
            .upsert_documents(&DocumentsUpsert { student_id: id, snils: "12345678901".into(), ..Default::default() })
            .await
            .unwrap();
        store.upsert_medical(&MedicalUpsert { student_id: id, ..Default::default() }).await.unwrap();
        store.upsert_consents(&ConsentsUpsert { student_id: id, ..Default::default() }).await.unwrap();
        let contact = NewContact { full_name: "Мама".into(), phone: "+7 900".into(), relation: "мать".into() };
        store.add_contact(id, &contact).await.unwrap();
        assert!(store.get_documents(id).await.unwrap().is_some());

        assert!(store.soft_delete_core(id, 2).await.unwrap());
        assert!(store.get_documents(id).await.unwrap().is_none());
        assert!(store.get_medical(id).await.unwrap().is_none());
        assert!(store.get_consents(id).await.unwrap().is_none());
        assert!(store.list_contacts(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_overwrites_every_column() {
        let store = MemoryStudentStore::new();
        let id = store.create_core(&core("S-2"), 1).await.unwrap();
        store
            .upsert_medical(&MedicalUpsert {
                student_id: id,
                benefits: Some("многодетная семья".into()),
                health_group: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .upsert_medical(&MedicalUpsert { student_id: id, allergies: Some("пыльца".into()), ..Default::default() })
            .await
            .unwrap();

        let medical = store.get_medical(id).await.unwrap().unwrap();
        assert_eq!(medical.benefits, None);
        assert_eq!(medical.health_group, None);
        assert_eq!(medical.allergies.as_deref(), Some("пыльца"));
    }

    #[tokio::test]
    async fn contacts_group_by_student() {
        let store = MemoryStudentStore::new();
        let a = store.create_core(&core("S-3"), 1).await.unwrap();
        let b = store.create_core(&core("S-4"), 1).await.unwrap();
        let contact = NewContact { full_name: "Мама".into(), phone: "+7 900".into(), relation: "мать".into() };
        store.add_contact(a, &contact).await.unwrap();
        store.add_contact(a, &contact).await.unwrap();
        store.add_contact(b, &contact).await.unwrap();

        let grouped = store.contacts_by_ids(&[a, b]).await.unwrap();
        assert_eq!(grouped[&a].len(), 2);
        assert_eq!(grouped[&b].len(), 1);

        assert_eq!(store.delete_contacts_for_student(a).await.unwrap(), 2);
        assert!(store.list_contacts(a).await.unwrap().is_empty());
    }
}
