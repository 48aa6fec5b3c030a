use lambda_http::{run, service_fn, Error};
use std::sync::Arc;
use taskboard_shared::AppState;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_http::tracing::init_default_subscriber();

    let state = Arc::new(AppState::from_env().await);
    tracing::info!("API lambda ready, table {}", state.config.table_name);

    run(service_fn(move |event| {
        let state = state.clone();
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
