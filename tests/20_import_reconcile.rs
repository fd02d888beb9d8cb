mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use common::{contact, valid_row};
use edubase_api::database::{MemoryStudentStore, StudentStore};
use edubase_api::services::import::Reconciler;

fn setup() -> (Arc<MemoryStudentStore>, Reconciler) {
    let store = Arc::new(MemoryStudentStore::new());
    let reconciler = Reconciler::new(store.clone());
    (store, reconciler)
}

#[tokio::test]
async fn new_row_is_created_with_every_sub_record() -> Result<()> {
    let (store, reconciler) = setup();

    let results = reconciler.reconcile(&[valid_row("A1", 3)], &[], 7, false).await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.row, 2);
    assert_eq!(result.student_number, "A1");
    assert!(result.created && !result.updated);
    assert_eq!(result.error, None);

    let id = result.student_id.expect("student id");
    let core = store.get_core(id).await?.expect("core");
    assert_eq!(core.birth_date, NaiveDate::from_ymd_opt(2018, 9, 1).unwrap());
    assert_eq!(core.created_by, 7);

    let consents = store.get_consents(id).await?.expect("consents");
    assert!(consents.consent_data_processing);
    assert_eq!(
        consents.consent_data_processing_date,
        NaiveDate::from_ymd_opt(2025, 9, 1)
    );
    assert!(!consents.consent_photo_publication);
    assert!(store.get_documents(id).await?.is_some());
    assert_eq!(store.get_medical(id).await?.and_then(|m| m.health_group), Some(1));
    Ok(())
}

#[tokio::test]
async fn bad_rows_do_not_stop_the_batch() -> Result<()> {
    let (store, reconciler) = setup();

    let mut bad_class = valid_row("A2", 3);
    bad_class.class_label = "7".to_string();
    let mut bad_date = valid_row("A3", 3);
    bad_date.birth_date = "31.02.2015".to_string();

    let rows = vec![valid_row("A1", 3), bad_class, bad_date, valid_row("A4", 3)];
    let results = reconciler.reconcile(&rows, &[], 1, false).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results.iter().map(|r| r.row).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    assert!(results[0].error.is_none() && results[3].error.is_none());
    assert_eq!(results[1].error.as_deref(), Some("Класс должен быть вида 7А/11Б"));
    assert!(results[2].error.as_deref().unwrap_or_default().starts_with("birth_date: "));
    assert!(!results[1].created && !results[2].created);
    assert_eq!(store.student_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn blank_student_number_fails_only_its_row() -> Result<()> {
    let (store, reconciler) = setup();

    let rows = vec![valid_row("A1", 3), valid_row("", 3), valid_row("A3", 3)];
    let results = reconciler.reconcile(&rows, &[], 1, false).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().map(|r| r.row).collect::<Vec<_>>(), vec![2, 3, 4]);
    assert!(results[0].created && results[0].error.is_none());
    assert!(results[2].created && results[2].error.is_none());

    let blank = &results[1];
    assert_eq!(blank.error.as_deref(), Some("student_number обязателен"));
    assert_eq!(blank.student_id, None);
    assert!(!blank.created && !blank.updated);
    assert_eq!(store.student_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn second_run_updates_instead_of_duplicating() -> Result<()> {
    let (store, reconciler) = setup();

    let first = reconciler.reconcile(&[valid_row("A1", 3)], &[], 1, false).await;
    let mut changed = valid_row("A1", 3);
    changed.class_label = "3Б".to_string();
    let second = reconciler.reconcile(&[changed], &[], 2, false).await;

    assert!(second[0].updated && !second[0].created);
    assert_eq!(second[0].student_id, first[0].student_id);
    assert_eq!(store.student_count().await, 1);

    let core = store.get_core(second[0].student_id.unwrap()).await?.unwrap();
    assert_eq!(core.class_label, "3Б");
    assert_eq!(core.updated_by, Some(2));
    Ok(())
}

#[tokio::test]
async fn contacts_append_or_replace() -> Result<()> {
    let (store, reconciler) = setup();
    let row = valid_row("A1", 3);

    let first = reconciler
        .reconcile(&[row.clone()], &[contact("A1", "Мама"), contact("A1", "Папа")], 1, false)
        .await;
    let id = first[0].student_id.unwrap();
    assert_eq!(store.list_contacts(id).await?.len(), 2);

    reconciler.reconcile(&[row.clone()], &[contact("A1", "Бабушка")], 1, false).await;
    assert_eq!(store.list_contacts(id).await?.len(), 3);

    let replaced = reconciler.reconcile(&[row], &[contact("A1", "Дедушка")], 1, true).await;
    assert!(replaced[0].error.is_none());
    let contacts = store.list_contacts(id).await?;
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].full_name, "Дедушка");
    Ok(())
}

#[tokio::test]
async fn replace_without_incoming_contacts_keeps_existing() -> Result<()> {
    let (store, reconciler) = setup();
    let row = valid_row("A1", 3);

    let first = reconciler.reconcile(&[row.clone()], &[contact("A1", "Мама")], 1, false).await;
    reconciler.reconcile(&[row], &[], 1, true).await;

    assert_eq!(store.list_contacts(first[0].student_id.unwrap()).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn teenager_without_passport_is_rejected() -> Result<()> {
    let (store, reconciler) = setup();

    let mut row = valid_row("A1", 3);
    row.birth_date = "2000-01-15".to_string();
    row.admission_year = 2007;
    let results = reconciler.reconcile(&[row.clone()], &[], 1, false).await;
    assert_eq!(results[0].error.as_deref(), Some("Паспорт обязателен (серия 4 цифры, номер 6 цифр) с 14 лет и 1 месяца"));

    row.passport_series = Some("4512".to_string());
    row.passport_number = Some("123456".to_string());
    let results = reconciler.reconcile(&[row], &[], 1, false).await;
    assert!(results[0].created, "{:?}", results[0].error);
    assert_eq!(store.student_count().await, 1);
    Ok(())
}

#[test]
fn result_json_shape() -> Result<()> {
    let result = edubase_api::services::import::ImportResult::new(2, "A1");
    let value = serde_json::to_value(&result)?;
    assert_eq!(
        value,
        serde_json::json!({
            "row": 2,
            "student_number": "A1",
            "created": false,
            "updated": false,
            "error": null
        })
    );
    Ok(())
}
