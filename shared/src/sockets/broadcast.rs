use super::connections::{connections_for_department, remove_connection};
use super::messages::BroadcastMessage;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Error;

/// Push a message to every connection watching `department`.
///
/// Returns how many connections received it. Connections API Gateway reports
/// as gone are deleted.
pub async fn broadcast_to_department(
    dynamo_client: &DynamoClient,
    api_gateway_client: &ApiGatewayManagementClient,
    table_name: &str,
    department: &str,
    message: &BroadcastMessage,
) -> Result<usize, Error> {
    let connections = connections_for_department(dynamo_client, table_name, department).await?;
    let message_json = serde_json::to_string(message)?;
    let mut delivered = 0;

    tracing::info!(
        "Broadcasting {} to {} connections in {}",
        message.r#type,
        connections.len(),
        department
    );

    for conn in connections {
        let result = api_gateway_client
            .post_to_connection()
            .connection_id(&conn.connection_id)
            .data(message_json.as_bytes().to_vec().into())
            .send()
            .await;

        match result {
            Ok(_) => delivered += 1,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_gone_exception()) => {
                tracing::info!("Connection {} is gone, removing", conn.connection_id);
                if let Err(e) = remove_connection(dynamo_client, table_name, &conn.connection_id).await {
                    tracing::warn!("Failed to remove stale connection {}: {}", conn.connection_id, e);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to send to connection {}: {}", conn.connection_id, e);
            }
        }
    }

    Ok(delivered)
}
