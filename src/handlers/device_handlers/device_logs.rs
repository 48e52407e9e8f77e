use crate::auth::AuthedUser;
use crate::errors::{AppError, ErrorMessage, ErrorType};
use crate::handlers::device_handlers::device::metadata_document;
use crate::handlers::device_handlers::parse_device_id;
use crate::models::LogResponse;
use crate::store::{DeviceStore, NewLog};
use bson::Bson;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use warp::http::StatusCode;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateLogBody {
    pub event: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

// Query for GET /devices/{id}/logs
#[derive(Debug, Deserialize, IntoParams)]
pub struct LogListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn validate_event(event: &str) -> Result<String, AppError> {
    let event = event.trim();
    if event.is_empty() {
        return Err(AppError::new("Event type is required", ErrorType::Validation));
    }
    Ok(event.to_string())
}

#[utoipa::path(
        post,
        path = "/devices/{id}/logs",
        request_body = CreateLogBody,
        responses(
            (status = 201, description = "Log entry created", body = LogResponse),
            (status = 400, description = "Invalid device ID or validation error", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn create_log_handler(
    id: String,
    user: AuthedUser,
    body: CreateLogBody,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    let event = validate_event(&body.event).map_err(|e| e.reject())?;
    let value = Bson::try_from(body.value)
        .map_err(|_| AppError::new("Log value is not representable", ErrorType::Validation).reject())?;
    let metadata = metadata_document(body.metadata).map_err(|e| e.reject())?;

    // Referential check at write time: the device must exist and belong to
    // the caller before anything is appended.
    let device = store.find_device(user.id, id).await.map_err(|e| e.reject())?;

    let log = store
        .append_log(
            device.id,
            NewLog {
                event,
                value,
                metadata,
            },
        )
        .await
        .map_err(|e| e.reject())?;

    let json = warp::reply::json(&json!({
        "success": true,
        "log": LogResponse::from(log),
    }));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[utoipa::path(
        get,
        path = "/devices/{id}/logs",
        params(LogListQuery),
        responses(
            (status = 200, description = "Logs for the device, newest first", body = [LogResponse]),
            (status = 400, description = "Invalid device ID", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn get_device_logs_handler(
    id: String,
    user: AuthedUser,
    query: LogListQuery,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    let device = store.find_device(user.id, id).await.map_err(|e| e.reject())?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    let logs = store
        .list_logs(device.id, page, limit)
        .await
        .map_err(|e| e.reject())?;
    let logs: Vec<LogResponse> = logs.into_iter().map(LogResponse::from).collect();

    Ok(warp::reply::json(&json!({
        "success": true,
        "logs": logs,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_must_be_non_empty() {
        let err = validate_event("  ").unwrap_err();
        assert_eq!(err.err_type, ErrorType::Validation);
        assert_eq!(err.message, "Event type is required");
        assert_eq!(validate_event(" units_consumed ").unwrap(), "units_consumed");
    }

    #[test]
    fn log_body_requires_event_and_value() {
        let body: CreateLogBody = serde_json::from_value(json!({
            "event": "units_consumed",
            "value": 5,
        }))
        .unwrap();
        assert_eq!(body.event, "units_consumed");
        assert!(body.metadata.is_none());

        assert!(serde_json::from_value::<CreateLogBody>(json!({"event": "x"})).is_err());
        assert!(serde_json::from_value::<CreateLogBody>(json!({"value": 5})).is_err());
    }

    #[test]
    fn log_values_may_be_structured() {
        let body: CreateLogBody = serde_json::from_value(json!({
            "event": "door_opened",
            "value": {"angle": 45, "by": "badge"},
        }))
        .unwrap();
        let bson = Bson::try_from(body.value).unwrap();
        let doc = bson.as_document().unwrap();
        assert!(matches!(
            doc.get("angle"),
            Some(Bson::Int32(45)) | Some(Bson::Int64(45))
        ));
        assert_eq!(doc.get_str("by").unwrap(), "badge");
    }
}
