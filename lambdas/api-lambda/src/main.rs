use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use complaint_box_shared::config::Config;
use complaint_box_shared::identity::CognitoIdentityProvider;
use complaint_box_shared::store::DynamoComplaintStore;
use complaint_box_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;

    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&aws_config);

    let store = Arc::new(DynamoComplaintStore::new(
        dynamo_client.clone(),
        config.table_name.clone(),
        config.owner_index.clone(),
        config.department_index.clone(),
    ));
    let identity = Arc::new(CognitoIdentityProvider::new(
        CognitoClient::new(&aws_config),
        dynamo_client.clone(),
        config.table_name.clone(),
        config.cognito_client_id.clone(),
        config.cognito_client_secret.clone(),
        config.cognito_user_pool_id.clone(),
    ));

    let state = AppState::new(config, store, identity, Some(dynamo_client));

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            // WebSocket API events carry a WebSocket request context
            if complaint_box_shared::sockets::is_websocket_event(&event) {
                complaint_box_shared::sockets::handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
