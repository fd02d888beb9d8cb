mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{contact, valid_row, TestApp};

fn core_body(number: &str, school_id: i64) -> Value {
    json!({
        "student_number": number,
        "last_name": "Смирнова",
        "first_name": "Ольга",
        "birth_date": "2018-03-05",
        "gender": "f",
        "school_id": school_id,
        "class_label": "2Б",
        "admission_year": 2025,
        "status": "enrolled",
        "reg_address": "г. Тверь, ул. Мира, 5",
        "fact_address": "г. Тверь, ул. Мира, 5"
    })
}

#[tokio::test]
async fn public_routes_need_no_token() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = app.send(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    Ok(())
}

#[tokio::test]
async fn api_rejects_missing_or_bad_tokens() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/students", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.send(Method::GET, "/api/students", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn create_read_update_delete() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    let (status, body) = app
        .send(Method::POST, "/api/students", Some(&token), Some(core_body("S-1", 3)))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_i64().expect("id");

    let (status, body) = app.send(Method::GET, &format!("/api/students/{id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["core"]["student_number"], "S-1");
    assert!(body["data"]["documents"].is_null());
    assert_eq!(body["data"]["contacts"], json!([]));

    let mut changed = core_body("S-1", 3);
    changed["class_label"] = json!("3Б");
    let (status, _) = app
        .send(Method::PATCH, &format!("/api/students/{id}"), Some(&token), Some(changed))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/students?class_label=3%D0%91", Some(&token), None).await?;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["full_name"], "Смирнова Ольга");

    let (status, _) = app.send(Method::DELETE, &format!("/api/students/{id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &format!("/api/students/{id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invalid_core_reports_field() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    let mut body = core_body("S-1", 3);
    body["gender"] = json!("x");
    let (status, body) = app.send(Method::POST, "/api/students", Some(&token), Some(body)).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["gender"], "Пол должен быть m или f");
    Ok(())
}

#[tokio::test]
async fn duplicate_number_conflicts() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    app.send(Method::POST, "/api/students", Some(&token), Some(core_body("S-1", 3)))
        .await?;
    let (status, _) = app
        .send(Method::POST, "/api/students", Some(&token), Some(core_body("S-1", 3)))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn documents_follow_the_age_rule() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    let (_, body) = app
        .send(Method::POST, "/api/students", Some(&token), Some(core_body("S-1", 3)))
        .await?;
    let id = body["data"]["id"].as_i64().expect("id");
    let uri = format!("/api/students/{id}/documents");

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&token), Some(json!({ "snils": "12345678901" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "snils": "12345678901", "birth_certificate": "II-АБ 000001" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, &format!("/api/students/{id}"), Some(&token), None).await?;
    assert_eq!(body["data"]["documents"]["snils"], "12345678901");
    Ok(())
}

#[tokio::test]
async fn contacts_can_be_added_and_removed() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    let (_, body) = app
        .send(Method::POST, "/api/students", Some(&token), Some(core_body("S-1", 3)))
        .await?;
    let id = body["data"]["id"].as_i64().expect("id");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/students/{id}/contacts"),
            Some(&token),
            Some(json!({ "full_name": "Смирнов Павел", "phone": "+79001112233", "relation": "отец" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let contact_id = body["data"]["id"].as_i64().expect("contact id");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/contacts/{contact_id}"), Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, &format!("/api/students/{id}"), Some(&token), None).await?;
    assert_eq!(body["data"]["contacts"], json!([]));
    Ok(())
}

#[tokio::test]
async fn school_accounts_stay_in_their_school() -> Result<()> {
    let app = TestApp::new();
    let district = app.district_token();
    let school = app.school_token(4);

    let (_, body) = app
        .send(Method::POST, "/api/students", Some(&district), Some(core_body("S-1", 3)))
        .await?;
    let foreign_id = body["data"]["id"].as_i64().expect("id");
    app.send(Method::POST, "/api/students", Some(&district), Some(core_body("S-2", 4)))
        .await?;

    let (status, _) = app
        .send(Method::GET, &format!("/api/students/{foreign_id}"), Some(&school), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/api/students", Some(&school), Some(core_body("S-3", 3)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // school_id in the query is overridden by the account's own school
    let (_, body) = app.send(Method::GET, "/api/students?school_id=3", Some(&school), None).await?;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["student_number"], "S-2");
    Ok(())
}

#[tokio::test]
async fn json_import_then_export() -> Result<()> {
    let app = TestApp::new();
    let token = app.district_token();

    let mut broken = valid_row("B2", 3);
    broken.snils = None;
    let request = json!({
        "rows": [valid_row("B1", 3), broken],
        "contacts": [contact("B1", "Иванова Мария")],
    });

    let (status, body) = app
        .send(Method::POST, "/api/import/students", Some(&token), Some(request))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report = &body["data"];
    assert_eq!(report["total"], 2);
    assert_eq!(report["created"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["results"][0]["error"], Value::Null);
    assert_eq!(report["results"][1]["row"], 3);
    assert_eq!(report["results"][1]["error"], "СНИЛС обязателен");

    let (status, body) = app.send(Method::GET, "/api/export/students", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let exported = &body["data"]["students"][0];
    assert_eq!(exported["core"]["student_number"], "B1");
    assert_eq!(exported["documents"]["snils"], "123-456-789 01");
    assert_eq!(exported["contacts"][0]["full_name"], "Иванова Мария");
    Ok(())
}

#[tokio::test]
async fn school_import_rejects_other_schools() -> Result<()> {
    let app = TestApp::new();
    let school = app.school_token(4);

    let request = json!({ "rows": [valid_row("C1", 3), valid_row("C2", 4)] });
    let (_, body) = app
        .send(Method::POST, "/api/import/students", Some(&school), Some(request))
        .await?;

    let results = &body["data"]["results"];
    assert!(results[0]["error"].is_string());
    assert!(results[0]["student_id"].is_null());
    assert_eq!(results[1]["created"], true);
    assert_eq!(app.store.student_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn school_import_does_not_reveal_foreign_students() -> Result<()> {
    let app = TestApp::new();
    let district = app.district_token();
    let school = app.school_token(4);

    let request = json!({ "rows": [valid_row("D1", 3)] });
    let (_, body) = app
        .send(Method::POST, "/api/import/students", Some(&district), Some(request))
        .await?;
    assert_eq!(body["data"]["created"], 1);

    let request = json!({ "rows": [valid_row("D1", 4)] });
    let (status, body) = app
        .send(Method::POST, "/api/import/students", Some(&school), Some(request))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let result = &body["data"]["results"][0];
    assert_eq!(result["error"], "ученик D1 числится в другой школе");
    assert!(result.get("student_id").is_none(), "{result}");
    assert_eq!(result["updated"], false);
    assert_eq!(body["data"]["failed"], 1);
    Ok(())
}
