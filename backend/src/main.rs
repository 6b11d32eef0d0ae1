use actix_web::{web, App, HttpServer};
use certgen::config::AppConfig;
use certgen::drafts::{AutoSaveSettings, SqliteTemplateStore};
use certgen::export::GenpdfPrinter;
use certgen::job_controller::{start_job_updater, JobsState};
use certgen::sample_data::ProcessGenerator;
use certgen::services::{self, AppState};
use env_logger::Env;
use log::info;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::load().map_err(io::Error::other)?;
    let store = SqliteTemplateStore::open(&config.storage.database_path).map_err(io::Error::other)?;
    let printer = GenpdfPrinter::new(&config.storage.fonts_dir);

    let mut app_state = AppState::new(
        Arc::new(store),
        Arc::new(printer),
        AutoSaveSettings::from(&config.autosave),
        &config.storage.output_dir,
    );
    if let Some(command) = &config.generator.command {
        info!("sample data generator: {command}");
        app_state = app_state.with_generator(Arc::new(ProcessGenerator::new(
            command.clone(),
            config.generator.args.clone(),
        )));
    }
    let app_state = web::Data::new(app_state);

    if let Some(max_idle) = config.session_idle_timeout() {
        let state = app_state.clone();
        tokio::spawn(async move { state.sessions.evict_idle_every(max_idle).await });
    }

    // Initialize job controller state
    let (jobs_state, rx) = JobsState::new();
    tokio::spawn(start_job_updater(jobs_state.clone(), rx));

    let (host, port) = config.bind_address();
    info!("Server running at http://{host}:{port}");

    let json_limit = config.server.json_limit_mb * 1024 * 1024;
    let server_state = app_state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(server_state.clone())
            .app_data(web::Data::new(jobs_state.clone()))
            .configure(services::configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    app_state.sessions.close_all().await;
    Ok(())
}
