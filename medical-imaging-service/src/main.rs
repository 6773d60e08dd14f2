use medical_imaging_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing; LOG_FORMAT=pretty for development, JSON otherwise
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "medical_imaging_service=debug,graph_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if config.openrouter_api_key.is_none() {
        warn!("Running without OPENROUTER_API_KEY: analyses will be served in fallback mode");
    }

    let app = create_app(&config).await;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!(%addr, model = %config.inference_model, "Medical Image Analysis Service starting");
    info!("Analysis endpoint: POST http://{}/api/medical/analyze", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
