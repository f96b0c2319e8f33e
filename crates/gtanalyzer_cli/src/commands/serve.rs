use tokio::net::TcpListener;

use crate::config::Config;
use crate::server::{self, AppState};
use crate::shutdown;

/// Serve the HTTP API until shutdown is requested.
pub(crate) async fn handle_serve(
    bind: Option<String>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let state = AppState::from_config(config);
    let sweepers = state.spawn_sweepers();

    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");
    if console::Term::stdout().is_term() {
        println!("gtanalyzer listening on http://{}", listener.local_addr()?);
    }

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown::shutdown_requested())
        .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}
