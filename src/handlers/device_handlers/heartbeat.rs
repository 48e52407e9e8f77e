use crate::auth::AuthedUser;
use crate::errors::ErrorMessage;
use crate::handlers::device_handlers::parse_device_id;
use crate::models::DeviceStatus;
use crate::store::DeviceStore;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatBody {
    pub status: DeviceStatus,
}

// Liveness is an explicit signal: log ingestion never refreshes
// `last_active_at`, only this route (and nothing at creation).
#[utoipa::path(
        post,
        path = "/devices/{id}/heartbeat",
        request_body = HeartbeatBody,
        responses(
            (status = 200, description = "Device heartbeat recorded", body = ErrorMessage),
            (status = 400, description = "Invalid device ID", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn record_heartbeat_handler(
    id: String,
    user: AuthedUser,
    body: HeartbeatBody,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    let last_active_at = store
        .record_heartbeat(user.id, id, body.status)
        .await
        .map_err(|e| e.reject())?;

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Device heartbeat recorded",
        "last_active_at": last_active_at,
    })))
}
