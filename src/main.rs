use std::sync::Arc;

use renshu_backend_rust::config::Config;
use renshu_backend_rust::db::DatabaseProxy;
use renshu_backend_rust::logging;
use renshu_backend_rust::services::grading::LlmGrader;
use renshu_backend_rust::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _file_log_guard = logging::init_tracing(&logging::LogSettings::from_env(&config.log_level));

    let db_proxy = match DatabaseProxy::from_env().await {
        Ok(proxy) => Arc::new(proxy),
        Err(err) => {
            tracing::error!(error = %err, "database initialization failed");
            std::process::exit(1);
        }
    };

    let grader = LlmGrader::from_env();
    if !grader.is_available() {
        tracing::warn!("LLM_API_KEY not set, answers cannot be graded");
    }

    let state = AppState::new(Arc::clone(&db_proxy), Arc::new(grader), config.ranking_zone);
    let app = renshu_backend_rust::create_app(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, zone = %config.ranking_zone, "renshu backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, closing database");
    db_proxy.close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
