use actix_web::{test, web, App};
use async_trait::async_trait;
use certgen::drafts::{AutoSaveSettings, SqliteTemplateStore, TemplateStore};
use certgen::error::{ExportError, GenerationError, PersistenceError};
use certgen::export::DocumentPrinter;
use certgen::job_controller::{start_job_updater, JobsState};
use certgen::sample_data::SampleDataGenerator;
use certgen::services::{self, AppState};
use chrono::{DateTime, Utc};
use common::jobs::JobStatus;
use common::model::draft::{SaveReceipt, StoredTemplate};
use common::model::template::{Geometry, TemplateConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct StubPrinter;

#[async_trait]
impl DocumentPrinter for StubPrinter {
    async fn print(&self, document: &str, _geometry: Geometry) -> Result<Vec<u8>, ExportError> {
        Ok(format!("%PDF-stub\n{document}").into_bytes())
    }
}

struct StubGenerator;

#[async_trait]
impl SampleDataGenerator for StubGenerator {
    async fn generate(&self, _variable_paths: &[String]) -> Result<String, GenerationError> {
        Ok("```json\n{\"recipient\": {\"name\": \"Ada\"}}\n```".to_string())
    }
}

fn app_state(dir: &tempfile::TempDir) -> web::Data<AppState> {
    let store = SqliteTemplateStore::open(dir.path().join("certgen.sqlite")).unwrap();
    let state = AppState::new(
        Arc::new(store),
        Arc::new(StubPrinter),
        AutoSaveSettings::default(),
        dir.path().join("pdfs"),
    )
    .with_generator(Arc::new(StubGenerator));
    web::Data::new(state)
}

fn jobs_state() -> web::Data<JobsState> {
    let (jobs, rx) = JobsState::new();
    tokio::spawn(start_job_updater(jobs.clone(), rx));
    web::Data::new(jobs)
}

#[actix_web::test]
async fn render_returns_document_and_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/templates/render")
        .set_json(json!({"config": {"title": "Diploma", "size": "square"}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert!(body["document"].as_str().unwrap().contains("Diploma"));
    assert_eq!(body["tokens"], json!(["recipient.name"]));
    assert_eq!(body["geometry"], json!({"width": 1080, "height": 1080}));
}

#[actix_web::test]
async fn save_load_and_export_a_template() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let config = TemplateConfig {
        title: "Diploma".to_string(),
        ..TemplateConfig::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/templates/save")
        .set_json(json!({"name": "Mi Plantilla!!", "config": config}))
        .to_request();
    let saved: Value = test::call_and_read_body_json(&app, req).await;
    let id = saved["id"].as_str().unwrap().to_string();
    assert_eq!(saved["version"], 1);

    let req = test::TestRequest::get().uri(&format!("/api/templates/{id}")).to_request();
    let loaded: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(loaded["template"]["config"]["title"], "Diploma");
    assert!(loaded["recovery"].is_null());

    let req = test::TestRequest::post()
        .uri(&format!("/api/templates/pdf/{id}"))
        .set_json(json!({"data": {"recipient": {"name": "Ada Lovelace"}}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let disposition = resp
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("mi-plantilla.pdf"));
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.starts_with("%PDF-stub"));
    assert!(body.contains("Ada Lovelace"));
    assert!(body.contains("@page"));
}

#[actix_web::test]
async fn unknown_template_is_a_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/templates/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "TemplateNotFound");
}

#[actix_web::test]
async fn autosave_is_offered_for_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/templates/save")
        .set_json(json!({"id": "t1", "name": "Diploma", "config": {"title": "saved"}}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/templates/autosave")
        .set_json(json!({"id": "t1", "config": {"title": "draft"}}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::get().uri("/api/templates/t1").to_request();
    let loaded: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(loaded["template"]["config"]["title"], "saved");
    assert_eq!(loaded["recovery"]["config"]["title"], "draft");
}

#[actix_web::test]
async fn variables_detect_resolve_and_sample() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let document = "<p>{{recipient.name}} {{firma_1.nombre}} {{fecha}}</p>";
    let req = test::TestRequest::post()
        .uri("/api/variables/detect")
        .set_json(json!({"document": document, "data": {"fecha": "hoy"}}))
        .to_request();
    let binding: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(binding["groups"]["general"], json!(["fecha"]));
    assert_eq!(binding["missing"], json!(["recipient.name", "firma_1.nombre"]));

    let req = test::TestRequest::post()
        .uri("/api/variables/sample")
        .set_json(json!({"paths": ["recipient.name"]}))
        .to_request();
    let sample: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(sample["recipient"]["name"], "Ada");

    let req = test::TestRequest::post()
        .uri("/api/variables/resolve")
        .set_json(json!({"document": document, "data": sample}))
        .to_request();
    let resolved: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        resolved["document"],
        "<p>Ada {{firma_1.nombre}} {{fecha}}</p>"
    );
}

#[actix_web::test]
async fn editing_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir);
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/api/sessions/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let opened: Value = test::read_body_json(resp).await;
    assert_eq!(opened["status"]["state"], "clean");
    assert!(opened["recovery"].is_null());

    let req = test::TestRequest::post()
        .uri("/api/sessions/s1/edit")
        .set_json(json!({"config": {"title": "Diploma"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 202);

    let req = test::TestRequest::post()
        .uri("/api/sessions/s1/save")
        .set_json(json!({"name": "Diploma"}))
        .to_request();
    let receipt: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(receipt["version"], 1);

    let req = test::TestRequest::get().uri("/api/sessions/s1").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["state"], "clean");
    assert_eq!(status["version"], 1);

    let req = test::TestRequest::delete().uri("/api/sessions/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);
    assert!(!state.sessions.is_open("s1").await);

    let req = test::TestRequest::get().uri("/api/sessions/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn merge_writes_one_pdf_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs_state();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .app_data(jobs.clone())
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/templates/save")
        .set_json(json!({"id": "t1", "name": "Diploma", "config": {}}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/merge/start")
        .set_json(json!({"template_id": "t1", "csv": "recipient.name\nAda\nGrace\n"}))
        .to_request();
    let started: Value = test::call_and_read_body_json(&app, req).await;
    let job_id = started["job_id"].as_str().unwrap().to_string();

    let mut status = None;
    for _ in 0..100 {
        status = jobs.status(&job_id).await;
        if matches!(status, Some(JobStatus::Completed(_)) | Some(JobStatus::Failed(_))) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(matches!(status, Some(JobStatus::Completed(_))), "{status:?}");

    let second = std::fs::read_to_string(dir.path().join("pdfs").join(format!("{job_id}_1.pdf"))).unwrap();
    assert!(second.contains("Grace"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/merge/status/{job_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

/// Knows no templates; confirmed saves take `save_delay`.
struct SlowSaveStore {
    save_delay: Duration,
}

#[async_trait]
impl TemplateStore for SlowSaveStore {
    async fn auto_save(
        &self,
        _id: &str,
        _config: &TemplateConfig,
        _document: &str,
    ) -> Result<DateTime<Utc>, PersistenceError> {
        Ok(Utc::now())
    }

    async fn save(
        &self,
        _id: &str,
        _config: &TemplateConfig,
        _document: &str,
        _name: &str,
        _description: &str,
    ) -> Result<SaveReceipt, PersistenceError> {
        tokio::time::sleep(self.save_delay).await;
        Ok(SaveReceipt {
            saved_at: Utc::now(),
            version: 1,
        })
    }

    async fn load(&self, id: &str) -> Result<StoredTemplate, PersistenceError> {
        Err(PersistenceError::NotFound(id.to_string()))
    }
}

#[actix_web::test]
async fn slow_save_does_not_block_other_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let state = web::Data::new(AppState::new(
        Arc::new(SlowSaveStore {
            save_delay: Duration::from_millis(1500),
        }),
        Arc::new(StubPrinter),
        AutoSaveSettings::default(),
        dir.path().join("pdfs"),
    ));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(services::configure),
    )
    .await;

    for id in ["slow", "other"] {
        let req = test::TestRequest::post().uri(&format!("/api/sessions/{id}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let save_slow = async {
        let req = test::TestRequest::post()
            .uri("/api/sessions/slow/save")
            .set_json(json!({"name": "Diploma"}))
            .to_request();
        test::call_service(&app, req).await.status()
    };
    let open_third = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let req = test::TestRequest::post().uri("/api/sessions/third").to_request();
        test::call_service(&app, req).await.status()
    };
    let status_other = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let started = Instant::now();
        let req = test::TestRequest::get().uri("/api/sessions/other").to_request();
        let status = test::call_service(&app, req).await.status();
        (status, started.elapsed())
    };

    let (saved, opened, (other, elapsed)) = tokio::join!(save_slow, open_third, status_other);
    assert_eq!(saved, 200);
    assert_eq!(opened, 201);
    assert_eq!(other, 200);
    assert!(elapsed < Duration::from_millis(500), "status waited {elapsed:?}");
}

#[actix_web::test]
async fn malformed_size_and_logo_bounds_still_render() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(services::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/templates/render")
        .set_json(json!({"config": {"size": 42, "logo": {"width": -50, "height": 120.5}}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["geometry"], json!({"width": 1123, "height": 794}));
}
