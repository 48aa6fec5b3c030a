//! Process-wide wiring shared by the lambdas: configuration, AWS clients and
//! the orchestrator built on top of them.

pub mod config;
pub mod sockets;

use aws_sdk_dynamodb::Client as DynamoClient;
use board_block::{BoardOrchestrator, Effects};
use std::sync::Arc;
use taskboard_atoms::activity::StoreActivityLog;
use taskboard_atoms::realtime::{Broadcaster, LocalBroadcaster};
use taskboard_atoms::store::{BoardStore, DynamoStore};

pub use config::Config;
use sockets::{ApiGatewayBroadcaster, ConnectionRegistry};

pub struct AppState {
    pub config: Config,
    pub dynamo_client: DynamoClient,
    pub connections: ConnectionRegistry,
    pub orchestrator: BoardOrchestrator,
}

impl AppState {
    /// Build clients once per cold start.
    pub async fn from_env() -> Self {
        let config = Config::from_env();
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let dynamo_client = DynamoClient::new(&sdk_config);

        let store: Arc<dyn BoardStore> = Arc::new(DynamoStore::new(dynamo_client.clone(), &config.table_name));
        let connections = ConnectionRegistry::new(dynamo_client.clone(), &config.table_name);

        let broadcaster: Arc<dyn Broadcaster> = match &config.websocket_endpoint {
            Some(endpoint) => Arc::new(ApiGatewayBroadcaster::new(&sdk_config, endpoint, connections.clone())),
            None => {
                tracing::warn!("WEBSOCKET_ENDPOINT not set; realtime events stay in-process");
                Arc::new(LocalBroadcaster::new())
            }
        };

        let effects = Effects::new(Arc::new(StoreActivityLog::new(store.clone())), broadcaster);
        let orchestrator = BoardOrchestrator::new(store, effects, config.settings());

        Self {
            config,
            dynamo_client,
            connections,
            orchestrator,
        }
    }
}
