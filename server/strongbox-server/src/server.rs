//! Server bootstrap: construct the pool, repositories and services,
//! install the auth middleware, start the rotation loop, and serve
//! until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth_identity::{AuthService, TokenService};
use database_layer::{
    CredentialRepository, CredentialStore, SettingsRepository, SettingsStore, UserRepository,
    UserStore,
};
use tokio::sync::broadcast;
use tonic::transport::Server;
use tracing::{error, info};

use crate::auth::AuthLayer;
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::grpc::VaultService;
use crate::proto::v1::vault_server::VaultServer;
use crate::services::{CredentialService, SecureService, UserService};
use crate::shutdown::wait_for_signal;
use crate::storage::S3Service;

pub async fn run(config: Config) -> ServerResult<()> {
    let addr: SocketAddr = config
        .listen_address
        .parse()
        .map_err(|err| ServerError::Configuration(format!("bad listen_address: {err}")))?;

    let pool = database_layer::connect(&config.database.postgres.connection_string).await?;

    let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(pool.clone()));
    let settings: Arc<dyn SettingsStore> = Arc::new(SettingsRepository::new(pool.clone()));
    let cred_store: Arc<dyn CredentialStore> = Arc::new(CredentialRepository::new(pool.clone()));

    let store = Arc::new(S3Service::new(&config.blockstore.s3).await?);
    store.init_bucket().await?;

    let secure = Arc::new(SecureService::init(settings).await?);

    let tokens = TokenService::new(&config.auth.token_secret)
        .map_err(|err| ServerError::Configuration(err.to_string()))?;
    let auth = AuthService::new(users.clone(), tokens.clone());

    let vault = VaultService::new(
        UserService::new(users),
        auth,
        CredentialService::new(cred_store),
        secure.clone(),
        store,
    );

    // The rotation task owns a shutdown receiver and is joined after
    // the server drains.
    let (shutdown_tx, _) = broadcast::channel(1);
    let rotation_interval = Duration::from_secs(config.security.rotation_interval_secs);
    info!(interval_secs = config.security.rotation_interval_secs, "starting key rotation loop");
    let rotation = tokio::spawn(
        secure
            .clone()
            .run_rotation(rotation_interval, shutdown_tx.subscribe()),
    );

    info!(address = %addr, "strongbox server starting");
    Server::builder()
        .layer(AuthLayer::new(tokens))
        .add_service(VaultServer::new(vault))
        .serve_with_shutdown(addr, wait_for_signal())
        .await
        .map_err(|err| ServerError::Internal(format!("server error: {err}")))?;

    info!("stopping rotation loop");
    let _ = shutdown_tx.send(());
    if let Err(err) = rotation.await {
        error!(error = %err, "rotation task failed to join");
    }

    pool.close().await;
    info!("strongbox server stopped");
    Ok(())
}
