use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use modqueue_monitor::config::{AlertConfig, Config, QueueSourceConfig, WorkerConfig};
use modqueue_monitor::monitor::snapshot::FilterActors;
use modqueue_monitor::routes::build_router;
use modqueue_monitor::state::AppState;
use modqueue_monitor::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

/// Config built directly so parallel tests never race on environment variables.
pub fn test_config(sled_path: String, ingest_token: Option<String>) -> Config {
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        ingest_token,
        worker: WorkerConfig {
            is_leader: false,
            report_on_startup: false,
        },
        queue_source: QueueSourceConfig {
            url: None,
            token: None,
            limit: 1000,
            timeout_secs: 5,
        },
        actors: FilterActors::default(),
        alerting: AlertConfig {
            webhook_url: Some("https://hooks.example.test/alerts".to_string()),
            ..AlertConfig::default()
        },
    }
}

async fn spawn_with_token(ingest_token: Option<String>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("modqueue-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string(), ingest_token);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_token(None).await
}

pub async fn spawn_test_app_with_token(token: &str) -> TestApp {
    spawn_with_token(Some(token.to_string())).await
}
