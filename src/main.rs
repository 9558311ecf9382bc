use anyhow::Context;
use std::sync::Arc;
use token_issuer::jwks::JwksPublisher;
use token_issuer::tracing_config::init_tracing;
use token_issuer::{Config, MemoryKeyStore, SigningCredentialManager, TokenIssuer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.tracing()).context("Failed to initialize tracing")?;

    info!(
        rotation_period_days = config.rotation_period_days,
        grace_days = config.grace_days,
        "Starting token issuer"
    );

    let manager = Arc::new(SigningCredentialManager::new(
        Arc::new(MemoryKeyStore::new()),
        config.key_policy(),
    ));
    let issuer = TokenIssuer::from_config(&config, manager.clone());
    let publisher = JwksPublisher::new(manager);

    let scopes = config.requested_scopes();
    let issuer_uri = config.issuer_for("http", "localhost");

    let issued = issuer
        .create_access_token(&issuer_uri, &config.client_id, None, scopes.as_deref())
        .await
        .context("Failed to issue access token")?;

    println!("{}", serde_json::to_string_pretty(&issued.into_response())?);
    println!("{}", publisher.jwks().await?.to_json()?);

    Ok(())
}
