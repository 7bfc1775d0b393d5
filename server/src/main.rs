use anyhow::Result;
use medibook_server::bootstrap;

#[tokio::main]
async fn main() -> Result<()> {
    // ring backs rustls; aws-lc is not compiled in
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    let app = bootstrap::setup().await?;
    let _log_guard = app.log_guard;

    match app.tls_config {
        Some(tls_config) => {
            tracing::info!("HTTPS server listening on https://{}", app.socket_addr);
            axum_server::bind_rustls(app.socket_addr, tls_config)
                .serve(app.router.into_make_service())
                .await?;
        }
        None => {
            tracing::info!("HTTP server listening on http://{}", app.socket_addr);
            let listener = tokio::net::TcpListener::bind(app.socket_addr).await?;
            axum::serve(listener, app.router).await?;
        }
    }

    Ok(())
}
