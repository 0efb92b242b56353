use clap::Parser;
use ledger_node::{router, AppState, Args};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let state = AppState::from_args(&args)?;
    info!(
        node_id = state.node_id(),
        difficulty = args.difficulty,
        peers = args.peers.len(),
        "ledger-node starting"
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("ledger-node listening on http://{}", args.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
