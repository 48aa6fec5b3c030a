use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use taskboard_shared::AppState;

mod socket_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let state = Arc::new(AppState::from_env().await);

    run(service_fn(move |event: LambdaEvent<_>| {
        let state = state.clone();
        async move { socket_handler::function_handler(event, state).await }
    }))
    .await
}
