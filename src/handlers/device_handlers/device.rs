use crate::auth::AuthedUser;
use crate::errors::{AppError, ErrorMessage, ErrorType};
use crate::handlers::device_handlers::parse_device_id;
use crate::models::{DeviceResponse, DeviceStatus, DeviceType};
use crate::store::{DeviceChanges, DeviceFilter, DeviceStore, NewDevice};
use bson::Document;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use warp::http::StatusCode;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateDeviceBody {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: Option<DeviceStatus>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeviceBody {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

// Query for GET /devices
#[derive(Debug, Deserialize, IntoParams)]
pub struct DeviceListQuery {
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// First violated constraint wins, same ordering as the request schema.
fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::new("Device name is required", ErrorType::Validation));
    }
    if name.chars().count() > 100 {
        return Err(AppError::new(
            "Device name cannot be more than 100 characters",
            ErrorType::Validation,
        ));
    }
    Ok(name.to_string())
}

/// Metadata is opaque but must at least be a JSON object.
pub fn metadata_document(value: Option<serde_json::Value>) -> Result<Document, AppError> {
    match value {
        None => Ok(Document::new()),
        Some(v) if v.is_object() => bson::to_document(&v)
            .map_err(|_| AppError::new("Metadata must be an object", ErrorType::Validation)),
        Some(_) => Err(AppError::new("Metadata must be an object", ErrorType::Validation)),
    }
}

#[utoipa::path(
        post,
        path = "/devices",
        request_body = CreateDeviceBody,
        responses(
            (status = 201, description = "Device created", body = DeviceResponse),
            (status = 400, description = "Validation error", body = ErrorMessage),
            (status = 401, description = "Authorization token invalid or expired", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn create_device_handler(
    user: AuthedUser,
    body: CreateDeviceBody,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let name = validate_name(&body.name).map_err(|e| e.reject())?;
    let metadata = metadata_document(body.metadata).map_err(|e| e.reject())?;

    let device = store
        .create_device(
            user.id,
            NewDevice {
                name,
                device_type: body.device_type,
                status: body.status.unwrap_or(DeviceStatus::Active),
                metadata,
            },
        )
        .await
        .map_err(|e| e.reject())?;

    let json = warp::reply::json(&json!({
        "success": true,
        "device": DeviceResponse::from(device),
    }));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[utoipa::path(
        get,
        path = "/devices",
        params(DeviceListQuery),
        responses(
            (status = 200, description = "Devices for the authenticated owner", body = [DeviceResponse]),
            (status = 401, description = "Authorization token invalid or expired", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn get_devices_handler(
    user: AuthedUser,
    query: DeviceListQuery,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    let filter = DeviceFilter {
        device_type: query.device_type,
        status: query.status,
    };

    let (devices, total) = store
        .list_devices(user.id, filter, page, limit)
        .await
        .map_err(|e| e.reject())?;

    let devices: Vec<DeviceResponse> = devices.into_iter().map(DeviceResponse::from).collect();

    Ok(warp::reply::json(&json!({
        "success": true,
        "devices": devices,
        "pagination": Pagination {
            page,
            limit,
            total,
            pages: pages_for(total, limit),
        },
    })))
}

#[utoipa::path(
        patch,
        path = "/devices/{id}",
        request_body = UpdateDeviceBody,
        responses(
            (status = 200, description = "Device updated", body = DeviceResponse),
            (status = 400, description = "Invalid device ID or validation error", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn update_device_handler(
    id: String,
    user: AuthedUser,
    body: UpdateDeviceBody,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    let name = match body.name {
        Some(name) => Some(validate_name(&name).map_err(|e| e.reject())?),
        None => None,
    };
    let metadata = match body.metadata {
        Some(v) => Some(metadata_document(Some(v)).map_err(|e| e.reject())?),
        None => None,
    };

    let device = store
        .update_device(
            user.id,
            id,
            DeviceChanges {
                name,
                device_type: body.device_type,
                status: body.status,
                metadata,
            },
        )
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "device": DeviceResponse::from(device),
    })))
}

#[utoipa::path(
        delete,
        path = "/devices/{id}",
        responses(
            (status = 200, description = "Device and its logs deleted", body = ErrorMessage),
            (status = 400, description = "Invalid device ID", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn delete_device_handler(
    id: String,
    user: AuthedUser,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    store.delete_device(user.id, id).await.map_err(|e| e.reject())?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Device deleted successfully",
    })))
}

pub fn pages_for(total: u64, limit: u32) -> u64 {
    let limit = limit.max(1) as u64;
    (total + limit - 1) / limit
}
