use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;

use ticketserver::config::AppConfig;
use ticketserver::llm::{AnthropicClassifier, Classifier, DisabledClassifier};
use ticketserver::shared::state::AppState;
use ticketserver::shared::utils::{create_conn, run_migrations};
use ticketserver::web_server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = AppConfig::from_env()?;

    let pool = create_conn(&config.database.url)?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

    let classifier: Arc<dyn Classifier> = match AnthropicClassifier::from_config(&config.classifier)
    {
        Some(classifier) => {
            info!("Ticket classification enabled (model: {})", config.classifier.model);
            Arc::new(classifier)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set - ticket classification disabled");
            Arc::new(DisabledClassifier)
        }
    };

    let host = config.server.host.clone();
    let port = config.server.port;

    let app_state = Arc::new(AppState {
        config,
        conn: pool,
        classifier,
    });

    run_server(app_state, &host, port).await?;
    Ok(())
}
