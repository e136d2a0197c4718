//! End-to-end API tests against the in-process router.

mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::json;

use common::{PASSWORD, Part, TestApp};

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let resp = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.text(), "OK");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let resp = app.request(Method::GET, "/api/v1/instansi", None, None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(resp.json()["error"], "Authentication required");

    let resp = app
        .request(Method::GET, "/api/v1/instansi", Some("sakip_bogus"), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_me_logout() {
    let app = TestApp::new();
    app.create_user("operator@example.go.id", "data_collector", None);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "operator@example.go.id", "password": "salah-sekali" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "operator@example.go.id", "password": PASSWORD })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let token = resp.data()["token"].as_str().unwrap().to_string();
    assert!(resp.data()["expires_at"].is_string());

    let resp = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let me = resp.data();
    assert_eq!(me["email"], "operator@example.go.id");
    assert_eq!(me["roles"], json!(["data_collector"]));
    assert!(me.get("password_hash").is_none());
    let permissions = me["permissions"].as_array().unwrap();
    assert!(permissions.contains(&json!("data:write")));
    // data:write implies data:read
    assert!(permissions.contains(&json!("data:read")));

    let resp = app
        .request(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() {
    let app = TestApp::new();
    let auditor = app.create_user("auditor@example.go.id", "auditor", None);
    let token = app.token_for(&auditor.id);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/instansi",
            Some(&token),
            Some(json!({ "code": "DINKES", "name": "Dinas Kesehatan" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(Method::GET, "/api/v1/admin/audit-logs", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_institution_validation() {
    let app = TestApp::new();

    let resp = app.post("/api/v1/instansi", json!({})).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &resp.json()["errors"];
    assert!(errors["code"].is_array());
    assert!(errors["name"].is_array());

    let resp = app
        .post(
            "/api/v1/instansi",
            json!({ "code": "DINKES", "name": "Dinas Kesehatan", "head_nip": "123" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["head_nip"].is_array());

    app.create_institution("DINKES").await;
    let resp = app
        .post(
            "/api/v1/instansi",
            json!({ "code": "DINKES", "name": "Duplikat" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_indicator_requires_targets() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;

    let base = json!({
        "institution_id": institution_id,
        "code": "IK-001",
        "name": "Cakupan imunisasi",
        "category": "outcome",
        "measurement_unit": "%",
        "measurement_type": "percentage",
        "frequency": "quarterly",
    });

    let resp = app.post("/api/v1/indicators", base.clone()).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["targets"].is_array());

    let mut duplicate = base.clone();
    duplicate["targets"] = json!([
        { "year": 2024, "target_value": 90 },
        { "year": 2024, "target_value": 95 },
    ]);
    let resp = app.post("/api/v1/indicators", duplicate).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut valid = base.clone();
    valid["targets"] = json!([
        { "year": 2024, "target_value": 90 },
        { "year": 2025, "target_value": 95 },
    ]);
    let resp = app.post("/api/v1/indicators", valid).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let indicator = resp.data();
    assert_eq!(indicator["targets"].as_array().unwrap().len(), 2);

    let id = indicator["id"].as_str().unwrap();
    let resp = app
        .put(&format!("/api/v1/indicators/{id}/targets"), json!({ "targets": [] }))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.get(&format!("/api/v1/indicators/{id}/periods?year=2024")).await;
    assert_eq!(resp.status, StatusCode::OK);
    let codes: Vec<_> = resp.data().as_array().unwrap().iter().map(|p| p["code"].clone()).collect();
    assert_eq!(codes, vec![json!("Q1"), json!("Q2"), json!("Q3"), json!("Q4")]);
}

#[tokio::test]
async fn test_performance_data_lifecycle() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;

    let data = app.create_data(&indicator_id, "Q1", 60.0).await;
    assert_eq!(data["status"], "draft");
    assert_eq!(data["target_value"], 80.0);
    assert_eq!(data["achievement"], 75.0);
    let id = data["id"].as_str().unwrap().to_string();

    // one record per indicator, year and period
    let resp = app
        .post(
            "/api/v1/performance-data",
            json!({ "indicator_id": indicator_id, "year": 2024, "period": "Q1", "actual_value": 1 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post(
            "/api/v1/performance-data",
            json!({ "indicator_id": indicator_id, "year": 2024, "period": "M01", "actual_value": 1 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["period"].is_array());

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/validate"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["status"], "submitted");

    let resp = app
        .put(
            &format!("/api/v1/performance-data/{id}"),
            json!({ "year": 2024, "period": "Q1", "actual_value": 70 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/validate"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "validated");
    assert!(resp.data()["validated_by"].is_string());

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/validate"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .request(
            Method::DELETE,
            &format!("/api/v1/performance-data/{id}"),
            Some(&app.admin_token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reject_requires_notes() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q2", 50.0).await;
    let id = data["id"].as_str().unwrap();

    app.post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/reject"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["notes"].is_array());

    let resp = app
        .post(
            &format!("/api/v1/performance-data/{id}/reject"),
            json!({ "notes": "Angka tidak sesuai laporan" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "rejected");
    assert_eq!(resp.data()["validation_notes"], "Angka tidak sesuai laporan");

    // rejected records are editable again
    let resp = app
        .put(
            &format!("/api/v1/performance-data/{id}"),
            json!({ "year": 2024, "period": "Q2", "actual_value": 72 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["status"], "draft");
    assert_eq!(resp.data()["achievement"], 90.0);
}

#[tokio::test]
async fn test_mandatory_indicator_needs_evidence() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let resp = app
        .post(
            "/api/v1/indicators",
            json!({
                "institution_id": institution_id,
                "code": "IK-009",
                "name": "Indikator wajib",
                "category": "output",
                "measurement_unit": "dokumen",
                "measurement_type": "number",
                "frequency": "annual",
                "is_mandatory": true,
                "targets": [{ "year": 2024, "target_value": 4 }],
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let indicator_id = resp.data()["id"].as_str().unwrap().to_string();

    let data = app.create_data(&indicator_id, "Y", 4.0).await;
    let id = data["id"].as_str().unwrap();

    let resp = app
        .get(&format!("/api/v1/performance-data/{id}/quality"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["is_valid"], false);

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["evidence"].is_array());

    let resp = app
        .multipart(
            &format!("/api/v1/performance-data/{id}/evidence"),
            &app.admin_token,
            &[Part::file("files", "laporan.pdf", b"%PDF-1.7 laporan")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());

    let resp = app
        .post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
}

#[tokio::test]
async fn test_evidence_upload_rules() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q1", 60.0).await;
    let id = data["id"].as_str().unwrap();
    let uri = format!("/api/v1/performance-data/{id}/evidence");

    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[Part::file("files", "virus.exe", b"MZ\x90\x00")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[Part::file("files", "palsu.pdf", b"not really a pdf")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .put(
            "/api/v1/admin/settings/upload.max_evidence_bytes",
            json!({ "value": 8 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());

    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[Part::file("files", "laporan.pdf", b"%PDF-1.7 laporan lengkap")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);

    app.put(
        "/api/v1/admin/settings/upload.max_evidence_bytes",
        json!({ "value": 1048576 }),
    )
    .await;

    let content = b"%PDF-1.7 laporan lengkap";
    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[
                Part::file("files", "laporan.pdf", content),
                Part::text("description", "Laporan triwulan"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let document = resp.data()[0].clone();
    assert_eq!(document["content_type"], "application/pdf");
    assert_eq!(document["description"], "Laporan triwulan");
    assert!(document.get("stored_path").is_none());
    let doc_id = document["id"].as_str().unwrap();

    let resp = app.get(&format!("/api/v1/evidence/{doc_id}/download")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, content);
    assert_eq!(resp.headers[header::CONTENT_TYPE], "application/pdf");

    let resp = app
        .request(
            Method::DELETE,
            &format!("/api/v1/evidence/{doc_id}"),
            Some(&app.admin_token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&uri).await;
    assert_eq!(resp.data(), json!([]));
}

#[tokio::test]
async fn test_import_preview_and_confirm() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    app.create_indicator(&institution_id, "IK-001", 80.0).await;

    let resp = app.get("/api/v1/performance-data/import/template").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().starts_with("indicator_code,period,actual_value,notes"));

    let csv = "indicator_code,period,actual_value,notes\n\
               IK-001,Q1,72,Triwulan satu\n\
               IK-404,Q1,10,\n\
               IK-001,Q2,abc,\n";
    let resp = app
        .multipart(
            "/api/v1/performance-data/import/preview",
            &app.admin_token,
            &[
                Part::file("file", "data.csv", csv.as_bytes()),
                Part::text("year", "2024"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let preview = resp.data();
    assert_eq!(preview["valid_rows"], 1);
    assert_eq!(preview["errors"].as_array().unwrap().len(), 2);
    let session_id = preview["session_id"].as_str().unwrap().to_string();

    // sessions belong to the user who previewed them
    let other = app.create_user("other@example.go.id", "superadmin", None);
    let other_token = app.token_for(&other.id);
    let resp = app
        .request(
            Method::POST,
            &format!("/api/v1/performance-data/import/{session_id}/confirm"),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .post(
            &format!("/api/v1/performance-data/import/{session_id}/confirm"),
            json!({}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    assert_eq!(resp.data()["imported"], 1);

    let resp = app.get("/api/v1/performance-data?period=Q1").await;
    let records = resp.json()["data"].as_array().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "draft");
    assert_eq!(records[0]["actual_value"], 72.0);

    let resp = app
        .post(
            &format!("/api/v1/performance-data/import/{session_id}/confirm"),
            json!({}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_rejects_non_csv() {
    let app = TestApp::new();
    let resp = app
        .multipart(
            "/api/v1/performance-data/import/preview",
            &app.admin_token,
            &[
                Part::file("file", "data.xlsx", b"PK\x03\x04"),
                Part::text("year", "2024"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["file"].is_array());
}

#[tokio::test]
async fn test_settings_are_typed() {
    let app = TestApp::new();
    let uri = "/api/v1/admin/settings/sakip.submission_deadline_days";

    let resp = app.get(uri).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["value"], 7);
    assert_eq!(resp.data()["type"], "integer");

    let resp = app.put(uri, json!({ "value": "abc" })).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.put(uri, json!({ "value": 14 })).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["value"], 14);

    let resp = app
        .put(
            "/api/v1/admin/settings/feature.flag",
            json!({ "value": true, "type": "boolean" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["value"], true);

    let resp = app
        .put(
            "/api/v1/admin/settings",
            json!({ "settings": { "app.name": "SAKIP Kota", "does.not.exist": 1 } }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let resp = app.get("/api/v1/admin/settings/app.name").await;
    assert_eq!(resp.data()["value"], "SAKIP");
}

#[tokio::test]
async fn test_changes_are_audited() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;

    let resp = app
        .put(
            &format!("/api/v1/instansi/{institution_id}"),
            json!({ "code": "DINKES", "name": "Dinas Kesehatan Kota" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());

    let resp = app.get("/api/v1/admin/audit-logs?module=instansi").await;
    assert_eq!(resp.status, StatusCode::OK);
    let entries = resp.json()["data"].as_array().unwrap().clone();
    let actions: Vec<_> = entries.iter().map(|e| e["action"].as_str().unwrap()).collect();
    assert!(actions.contains(&"CREATE"));
    assert!(actions.contains(&"UPDATE"));

    let update = entries.iter().find(|e| e["action"] == "UPDATE").unwrap();
    assert_eq!(update["old_values"]["name"], "Dinas DINKES");
    assert_eq!(update["new_values"]["name"], "Dinas Kesehatan Kota");
    assert_eq!(update["institution_id"], institution_id.as_str());
}

#[tokio::test]
async fn test_scoped_user_sees_own_institution_only() {
    let app = TestApp::new();
    let own = app.create_institution("DINKES").await;
    let other = app.create_institution("DISDIK").await;
    let own_indicator = app.create_indicator(&own, "IK-001", 80.0).await;
    let other_indicator = app.create_indicator(&other, "IK-002", 80.0).await;

    let user = app.create_user("operator@example.go.id", "data_collector", Some(&own));
    let token = app.token_for(&user.id);

    let resp = app
        .request(Method::GET, &format!("/api/v1/instansi/{other}"), Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(Method::GET, "/api/v1/indicators", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let ids: Vec<_> = resp.json()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![own_indicator.clone()]);

    let resp = app
        .request(
            Method::POST,
            "/api/v1/performance-data",
            Some(&token),
            Some(json!({
                "indicator_id": other_indicator,
                "year": 2024,
                "period": "Q1",
                "actual_value": 10,
            })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(
            Method::GET,
            &format!("/sakip/api/indicators/by-instansi/{other}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .request(
            Method::GET,
            &format!("/sakip/api/indicators/{own_indicator}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["targets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_assessment_and_report_review() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q1", 76.0).await;
    let data_id = data["id"].as_str().unwrap().to_string();

    let resp = app
        .post("/api/v1/assessments/auto", json!({ "performance_data_id": data_id }))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    app.post(&format!("/api/v1/performance-data/{data_id}/submit"), json!({}))
        .await;
    app.post(&format!("/api/v1/performance-data/{data_id}/validate"), json!({}))
        .await;

    let resp = app
        .post("/api/v1/assessments/auto", json!({ "performance_data_id": data_id }))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let assessment = resp.data();
    assert_eq!(assessment["overall_score"], 95.0);
    assert_eq!(assessment["achievement_level"], "excellent");
    assert_eq!(assessment["status"], "draft");
    let assessment_id = assessment["id"].as_str().unwrap().to_string();

    let resp = app
        .post(
            "/api/v1/assessments",
            json!({
                "indicator_id": indicator_id,
                "period": "Q1 2024",
                "criteria": [
                    { "name": "Kelengkapan", "weight": 1, "score": 80 },
                    { "name": "Ketepatan", "weight": 3, "score": 60 },
                ],
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    assert_eq!(resp.data()["overall_score"], 65.0);

    let resp = app
        .post(&format!("/api/v1/assessments/{assessment_id}/approve"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    app.post(&format!("/api/v1/assessments/{assessment_id}/submit"), json!({}))
        .await;
    let resp = app
        .post(&format!("/api/v1/assessments/{assessment_id}/approve"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "approved");

    let resp = app
        .request(
            Method::DELETE,
            &format!("/api/v1/assessments/{assessment_id}"),
            Some(&app.admin_token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post(
            "/api/v1/reports",
            json!({
                "institution_id": institution_id,
                "title": "Laporan Kinerja 2024",
                "report_type": "annual",
                "year": 2024,
                "period": "2024",
                "indicator_ids": [indicator_id],
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let report_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .get(&format!("/api/v1/reports/{report_id}/export?format=json"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let lines = resp.data()["lines"].as_array().unwrap().clone();
    assert_eq!(lines.len(), 1);

    let resp = app
        .get(&format!("/api/v1/reports/{report_id}/export"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );

    let resp = app
        .get(&format!("/api/v1/reports/{report_id}/export?format=pdf"))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    app.post(&format!("/api/v1/reports/{report_id}/submit"), json!({}))
        .await;
    let resp = app
        .post(&format!("/api/v1/reports/{report_id}/reject"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let resp = app
        .post(
            &format!("/api/v1/reports/{report_id}/reject"),
            json!({ "notes": "Lengkapi analisis" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], "rejected");
    assert_eq!(resp.data()["review_notes"], "Lengkapi analisis");
}

#[tokio::test]
async fn test_dashboard_counts() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let first = app.create_data(&indicator_id, "Q1", 80.0).await;
    app.create_data(&indicator_id, "Q2", 40.0).await;

    let id = first["id"].as_str().unwrap();
    app.post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;

    let resp = app
        .get(&format!("/api/v1/dashboard?instansi_id={institution_id}&year=2024"))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let dashboard = resp.data();
    assert_eq!(dashboard["total_indicators"], 1);
    assert_eq!(dashboard["total_records"], 2);
    assert_eq!(dashboard["status_counts"]["draft"], 1);
    assert_eq!(dashboard["status_counts"]["submitted"], 1);
    assert_eq!(dashboard["submission_rate"], 50.0);
}

#[tokio::test]
async fn test_user_admin() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;

    let resp = app.get("/api/v1/admin/roles").await;
    let collector = resp.data()
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "data_collector")
        .unwrap()["id"]
        .clone();

    let resp = app
        .post(
            "/api/v1/admin/users",
            json!({
                "name": "Operator",
                "email": "operator@example.go.id",
                "password": "short",
                "institution_id": institution_id,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["password"].is_array());

    let resp = app
        .post(
            "/api/v1/admin/users",
            json!({
                "name": "Operator",
                "email": "Operator@Example.go.id",
                "password": PASSWORD,
                "institution_id": institution_id,
                "role_ids": [collector],
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let user = resp.data();
    assert_eq!(user["email"], "operator@example.go.id");
    assert_eq!(user["roles"], json!(["data_collector"]));

    let resp = app
        .post(
            "/api/v1/admin/users",
            json!({
                "name": "Kembar",
                "email": "operator@example.go.id",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .post(
            "/api/v1/admin/roles",
            json!({ "name": "viewer", "permissions": ["data:read", "bogus:perm"] }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .post(
            "/api/v1/admin/roles",
            json!({ "name": "viewer", "permissions": ["data:read"] }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.data()["permissions"], json!(["data:read"]));

    let resp = app.get("/api/v1/admin/permissions").await;
    assert!(
        resp.data()
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["name"] == "settings:admin")
    );
}

#[tokio::test]
async fn test_request_revision_requires_notes() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q3", 64.0).await;
    let id = data["id"].as_str().unwrap();
    let uri = format!("/api/v1/performance-data/{id}/request-revision");

    let resp = app.post(&uri, json!({ "notes": "Lengkapi sumber data" })).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    app.post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;

    let resp = app.post(&uri, json!({ "notes": "   " })).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["notes"].is_array());

    let resp = app.post(&uri, json!({ "notes": "Lengkapi sumber data" })).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["status"], "needs_revision");
    assert_eq!(resp.data()["validation_notes"], "Lengkapi sumber data");

    let resp = app
        .put(
            &format!("/api/v1/performance-data/{id}"),
            json!({ "year": 2024, "period": "Q3", "actual_value": 70 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["status"], "draft");
}

#[tokio::test]
async fn test_export_performance_data_csv() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let first = app.create_data(&indicator_id, "Q1", 60.0).await;
    app.create_data(&indicator_id, "Q2", 40.0).await;

    let id = first["id"].as_str().unwrap();
    app.post(&format!("/api/v1/performance-data/{id}/submit"), json!({}))
        .await;

    let resp = app.get("/api/v1/performance-data/export").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let text = resp.text();
    let lines: Vec<_> = text.lines().collect();
    assert!(lines[0].starts_with("indicator_code,indicator_name,year,period"));
    assert_eq!(lines.len(), 3);

    let resp = app
        .get("/api/v1/performance-data/export?status=submitted")
        .await;
    let text = resp.text();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("IK-001,Indikator IK-001,2024,Q1,"));

    let resp = app.get("/api/v1/performance-data/export?period=Q4").await;
    assert_eq!(resp.text().lines().count(), 1);
}

#[tokio::test]
async fn test_import_file_size_limit() {
    let app = TestApp::with_config(|config| config.max_import_bytes = 64);
    let institution_id = app.create_institution("DINKES").await;
    app.create_indicator(&institution_id, "IK-001", 80.0).await;

    let mut csv = String::from("indicator_code,period,actual_value,notes\n");
    for _ in 0..5 {
        csv.push_str("IK-001,Q1,72,Catatan yang cukup panjang\n");
    }
    let resp = app
        .multipart(
            "/api/v1/performance-data/import/preview",
            &app.admin_token,
            &[
                Part::file("file", "data.csv", csv.as_bytes()),
                Part::text("year", "2024"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_indicator_with_data_keeps_institution_and_frequency() {
    let app = TestApp::new();
    let own = app.create_institution("DINKES").await;
    let other = app.create_institution("DISDIK").await;
    let indicator_id = app.create_indicator(&own, "IK-001", 80.0).await;
    let idle_id = app.create_indicator(&own, "IK-002", 80.0).await;
    app.create_data(&indicator_id, "Q1", 60.0).await;

    let body = |institution: &str, frequency: &str, name: &str| {
        json!({
            "institution_id": institution,
            "code": "IK-001",
            "name": name,
            "category": "output",
            "measurement_unit": "%",
            "measurement_type": "percentage",
            "frequency": frequency,
        })
    };
    let uri = format!("/api/v1/indicators/{indicator_id}");

    let resp = app.put(&uri, body(&other, "quarterly", "Dipindah")).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app.put(&uri, body(&own, "monthly", "Bulanan")).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app.put(&uri, body(&own, "quarterly", "Nama baru")).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["name"], "Nama baru");

    let resp = app.get(&format!("/api/v1/indicators/{indicator_id}")).await;
    assert_eq!(resp.data()["institution_id"], own.as_str());
    assert_eq!(resp.data()["frequency"], "quarterly");

    // without data the indicator may move
    let mut moved = body(&other, "monthly", "Indikator kosong");
    moved["code"] = json!("IK-002");
    let resp = app.put(&format!("/api/v1/indicators/{idle_id}"), moved).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.data()["institution_id"], other.as_str());
}

#[tokio::test]
async fn test_deadline_setting_is_bounded() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q1", 60.0).await;
    let id = data["id"].as_str().unwrap();

    let uri = "/api/v1/admin/settings/sakip.submission_deadline_days";
    let resp = app.put(uri, json!({ "value": 1_000_000_000 })).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let resp = app.put(uri, json!({ "value": -5 })).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.get(uri).await;
    assert_eq!(resp.data()["value"], 7);

    let resp = app
        .get(&format!("/api/v1/performance-data/{id}/quality"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_upload_leaves_nothing_behind() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;
    let indicator_id = app.create_indicator(&institution_id, "IK-001", 80.0).await;
    let data = app.create_data(&indicator_id, "Q1", 60.0).await;
    let id = data["id"].as_str().unwrap();
    let uri = format!("/api/v1/performance-data/{id}/evidence");

    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[
                Part::file("files", "laporan.pdf", b"%PDF-1.7 laporan"),
                Part::file("files", "palsu.pdf", b"bukan pdf"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.get(&uri).await;
    assert_eq!(resp.data(), json!([]));
    assert!(!app.temp_dir.path().join("evidence").join(id).exists());

    let resp = app
        .multipart(
            &uri,
            &app.admin_token,
            &[
                Part::file("files", "laporan.pdf", b"%PDF-1.7 laporan"),
                Part::file("files", "lampiran.pdf", b"%PDF-1.4 lampiran"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    assert_eq!(resp.data().as_array().unwrap().len(), 2);

    let resp = app
        .get("/api/v1/admin/audit-logs?module=performance_data&action=upload")
        .await;
    assert_eq!(resp.json()["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_program_hierarchy() {
    let app = TestApp::new();
    let institution_id = app.create_institution("DINKES").await;

    let resp = app
        .post(
            "/api/v1/sasaran-strategis",
            json!({ "institution_id": institution_id, "code": "SS-01", "name": "Meningkatnya derajat kesehatan" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let objective_id = resp.data()["id"].as_str().unwrap().to_string();

    let resp = app
        .post(
            "/api/v1/programs",
            json!({
                "institution_id": institution_id,
                "objective_id": objective_id,
                "code": "P-01",
                "name": "Program pelayanan kesehatan",
                "budget": 1_500_000_000.0,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["fiscal_year"].is_array());

    let resp = app
        .post(
            "/api/v1/programs",
            json!({
                "institution_id": institution_id,
                "objective_id": objective_id,
                "code": "P-01",
                "name": "Program pelayanan kesehatan",
                "budget": 1_500_000_000.0,
                "fiscal_year": 2024,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let program_id = resp.data()["id"].as_str().unwrap().to_string();

    let activity = |start: &str, end: &str| {
        json!({
            "program_id": program_id,
            "code": "K-01",
            "name": "Posyandu keliling",
            "budget": 250_000_000.0,
            "start_date": start,
            "end_date": end,
        })
    };
    let resp = app
        .post("/api/v1/kegiatan", activity("2024-06-01", "2024-01-01"))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json()["errors"]["end_date"].is_array());

    let resp = app
        .post("/api/v1/kegiatan", activity("2024-01-01", "2024-06-30"))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    assert_eq!(resp.data()["program_id"], program_id.as_str());
    assert_eq!(resp.data()["start_date"], "2024-01-01");

    let resp = app
        .get(&format!("/sakip/api/kegiatan/by-program/{program_id}"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data().as_array().unwrap().len(), 1);
}
