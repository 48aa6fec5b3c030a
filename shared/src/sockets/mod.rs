pub mod broadcaster;
pub mod connections;
pub mod messages;

pub use broadcaster::ApiGatewayBroadcaster;
pub use connections::ConnectionRegistry;
pub use messages::{BroadcastMessage, WebSocketAction, WebSocketMessage};
