use crate::{
    config::Settings,
    error::Result,
    expo_sender::ExpoClient,
    fcm_sender::FcmClient,
    redis_store::{self, RedisDocumentStore},
    store::DocumentStore,
};
use std::{env, sync::Arc};

/// Shared application state.
///
/// Built once at process start; every trigger invocation borrows the same
/// store handle and provider clients.
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn DocumentStore>,
    pub fcm_client: Arc<FcmClient>,
    pub expo_client: Arc<ExpoClient>,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self> {
        // Determine Redis URL: prioritize REDIS_URL env var over settings
        let redis_url = match env::var("REDIS_URL") {
            Ok(url_from_env) => {
                tracing::info!("Using Redis URL from REDIS_URL environment variable");
                url_from_env
            }
            Err(_) => {
                tracing::info!(
                    "REDIS_URL environment variable not set. Using Redis URL from settings"
                );
                settings.redis.url.clone()
            }
        };

        let redis_pool =
            redis_store::create_pool(&redis_url, settings.redis.connection_pool_size).await?;
        let store: Arc<dyn DocumentStore> = Arc::new(RedisDocumentStore::new(redis_pool));

        let fcm_client = FcmClient::new(&settings.fcm)?;
        tracing::info!(project_id = %settings.fcm.project_id, "Initialized FCM client");

        let expo_client = ExpoClient::new(&settings.expo)?;
        tracing::info!(
            endpoint = %settings.expo.endpoint,
            chunk_size = settings.expo.chunk_size,
            "Initialized Expo push client"
        );

        Ok(Self::with_components(
            settings,
            store,
            Arc::new(fcm_client),
            Arc::new(expo_client),
        ))
    }

    /// Assembles state from already-built collaborators.
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        fcm_client: Arc<FcmClient>,
        expo_client: Arc<ExpoClient>,
    ) -> Self {
        AppState {
            settings,
            store,
            fcm_client,
            expo_client,
        }
    }
}
