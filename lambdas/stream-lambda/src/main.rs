use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use complaint_box_shared::config::Config;
use complaint_box_shared::sockets::broadcast::broadcast_to_department;
use complaint_box_shared::sockets::messages::BroadcastMessage;
use complaint_box_shared::store::codec::{complaint_from_item, Item, COMPLAINT_PREFIX};
use complaint_box_shared::store::ChangeKind;
use complaint_box_shared::types::Complaint;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

struct StreamContext {
    table_name: String,
    dynamo_client: DynamoClient,
    api_gateway_client: ApiGatewayManagementClient,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::stream_from_env()?;
    let aws_config = aws_config::load_from_env().await;

    let mut api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&aws_config);
    if let Some(endpoint) = &config.ws_api_endpoint {
        api_config = api_config.endpoint_url(endpoint);
    }

    let context = Arc::new(StreamContext {
        table_name: config.table_name.clone(),
        dynamo_client: DynamoClient::new(&aws_config),
        api_gateway_client: ApiGatewayManagementClient::from_conf(api_config.build()),
    });

    run(service_fn(move |event: LambdaEvent<Event>| {
        let context = Arc::clone(&context);
        async move { function_handler(event, &context).await }
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Event>, context: &StreamContext) -> Result<(), Error> {
    tracing::info!("DynamoDB Stream event received with {} records", event.payload.records.len());

    for record in &event.payload.records {
        if let Err(e) = process_record(record, context).await {
            tracing::error!("Failed to process record: {}", e);
        }
    }

    Ok(())
}

async fn process_record(record: &EventRecord, context: &StreamContext) -> Result<(), Error> {
    let Some((kind, complaint)) = decode_record(record)? else {
        return Ok(());
    };

    let message = BroadcastMessage::for_change(kind, &complaint);
    let delivered = broadcast_to_department(
        &context.dynamo_client,
        &context.api_gateway_client,
        &context.table_name,
        &complaint.department,
        &message,
    )
    .await?;

    tracing::info!("Broadcast {} for {} reached {} connections", message.r#type, complaint.id, delivered);
    Ok(())
}

/// Complaint writes worth pushing; `None` for removals and other entities.
fn decode_record(record: &EventRecord) -> Result<Option<(ChangeKind, Complaint)>, Error> {
    let Some(kind) = change_kind(&record.event_name) else {
        return Ok(None);
    };

    let image = image_to_item(&serde_json::to_value(&record.change.new_image)?);
    let is_complaint = image
        .get("PK")
        .and_then(|pk| pk.as_s().ok())
        .is_some_and(|pk| pk.starts_with(COMPLAINT_PREFIX));
    if !is_complaint {
        return Ok(None);
    }

    Ok(Some((kind, complaint_from_item(&image)?)))
}

fn change_kind(event_name: &str) -> Option<ChangeKind> {
    match event_name {
        "INSERT" => Some(ChangeKind::Created),
        "MODIFY" => Some(ChangeKind::Updated),
        _ => None,
    }
}

/// Stream images arrive as DynamoDB JSON (`{"S": ".."}`); plain JSON scalars
/// are accepted as well. Attributes of other shapes are dropped.
fn image_to_item(image: &Value) -> Item {
    let Some(fields) = image.as_object() else {
        return Item::new();
    };
    fields
        .iter()
        .filter_map(|(name, value)| attribute_from_json(value).map(|attr| (name.clone(), attr)))
        .collect()
}

fn attribute_from_json(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::String(s) => Some(AttributeValue::S(s.clone())),
        Value::Bool(b) => Some(AttributeValue::Bool(*b)),
        Value::Number(n) => Some(AttributeValue::N(n.to_string())),
        Value::Null => Some(AttributeValue::Null(true)),
        Value::Object(tagged) if tagged.len() == 1 => {
            let (tag, inner) = tagged.iter().next()?;
            match (tag.as_str(), inner) {
                ("S", Value::String(s)) => Some(AttributeValue::S(s.clone())),
                ("N", Value::String(n)) => Some(AttributeValue::N(n.clone())),
                ("BOOL", Value::Bool(b)) => Some(AttributeValue::Bool(*b)),
                ("NULL", _) => Some(AttributeValue::Null(true)),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complaint_box_shared::types::Status;

    fn complaint_image(anonymous: bool) -> Value {
        serde_json::json!({
            "PK": {"S": "COMPLAINT#c1"},
            "SK": {"S": "COMPLAINT#c1"},
            "message": {"S": "Projector broken"},
            "category": {"S": "academic"},
            "department": {"S": "CS"},
            "created_at": {"S": "2024-03-01T09:30:00.250Z"},
            "status": {"S": "inProgress"},
            "user_id": {"S": "student-a"},
            "is_anonymous": {"BOOL": anonymous},
            "email": {"S": "a@example.edu"},
            "tags": {"SS": ["ignored"]}
        })
    }

    #[test]
    fn test_change_kind() {
        assert_eq!(change_kind("INSERT"), Some(ChangeKind::Created));
        assert_eq!(change_kind("MODIFY"), Some(ChangeKind::Updated));
        assert_eq!(change_kind("REMOVE"), None);
    }

    #[test]
    fn test_stream_image_decodes_to_complaint() {
        let item = image_to_item(&complaint_image(false));
        assert!(!item.contains_key("tags"));

        let complaint = complaint_from_item(&item).unwrap();
        assert_eq!(complaint.id, "c1");
        assert_eq!(complaint.status, Status::InProgress);
        assert_eq!(complaint.email.as_deref(), Some("a@example.edu"));
    }

    #[test]
    fn test_anonymous_image_loses_email() {
        let item = image_to_item(&complaint_image(true));
        let complaint = complaint_from_item(&item).unwrap();
        assert!(complaint.is_anonymous);
        assert_eq!(complaint.email, None);
    }

    #[test]
    fn test_plain_json_scalars_are_accepted() {
        let item = image_to_item(&serde_json::json!({
            "PK": "CONNECTION#abc",
            "is_anonymous": false,
            "count": 3,
        }));
        assert_eq!(item.get("PK"), Some(&AttributeValue::S("CONNECTION#abc".to_string())));
        assert_eq!(item.get("is_anonymous"), Some(&AttributeValue::Bool(false)));
        assert_eq!(item.get("count"), Some(&AttributeValue::N("3".to_string())));
    }
}
