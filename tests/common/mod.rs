#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use edubase_api::app::{build_router, AppState};
use edubase_api::auth::{generate_jwt, Claims};
use edubase_api::config::AppConfig;
use edubase_api::database::MemoryStudentStore;
use edubase_api::services::import::{ImportContact, ImportStudent};
use edubase_api::types::Role;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStudentStore>,
    secret: String,
}

impl TestApp {
    /// Router over an empty in-memory store with development settings.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStudentStore::new());
        let config = AppConfig::development();
        let secret = config.security.jwt_secret.clone();
        let router = build_router(AppState::new(store.clone(), config));
        Self { router, store, secret }
    }

    pub fn district_token(&self) -> String {
        self.token(Role::Roo, None)
    }

    pub fn school_token(&self, school_id: i64) -> String {
        self.token(Role::School, Some(school_id))
    }

    fn token(&self, role: Role, school_id: Option<i64>) -> String {
        generate_jwt(&Claims::new(1, role, school_id, 1), &self.secret).expect("sign test token")
    }

    /// Send a request and return the status plus the parsed JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }
}

/// A row that passes every check: young enough to need only a birth certificate.
pub fn valid_row(number: &str, school_id: i64) -> ImportStudent {
    ImportStudent {
        student_number: number.to_string(),
        last_name: "Иванов".to_string(),
        first_name: "Иван".to_string(),
        middle_name: Some("Иванович".to_string()),
        birth_date: "01.09.2018".to_string(),
        gender: "m".to_string(),
        school_id,
        class_label: "2А".to_string(),
        admission_year: 2025,
        status: "enrolled".to_string(),
        reg_address: "г. Тверь, ул. Советская, 1".to_string(),
        fact_address: "г. Тверь, ул. Советская, 1".to_string(),
        snils: Some("123-456-789 01".to_string()),
        birth_certificate: Some("II-АБ 123456".to_string()),
        health_group: Some(1),
        consent_data_processing: Some(true),
        consent_data_processing_date: Some("2025-09-01".to_string()),
        ..Default::default()
    }
}

pub fn contact(number: &str, full_name: &str) -> ImportContact {
    ImportContact {
        student_number: number.to_string(),
        full_name: full_name.to_string(),
        phone: "+7 900 123-45-67".to_string(),
        relation: "мать".to_string(),
    }
}
