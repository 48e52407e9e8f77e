use crate::auth::AuthedUser;
use crate::errors::ErrorMessage;
use crate::handlers::device_handlers::parse_device_id;
use crate::store::DeviceStore;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

pub const USAGE_EVENT: &str = "units_consumed";

// Query for GET /devices/{id}/usage
#[derive(Debug, Deserialize, IntoParams)]
pub struct UsageQuery {
    pub range: Option<String>,
}

/// Coarse window tokens only; anything unrecognized falls back to 24h while
/// the response still echoes the raw token.
pub fn resolve_range(token: &str) -> Duration {
    match token {
        "1h" => Duration::hours(1),
        "24h" => Duration::hours(24),
        "7d" => Duration::days(7),
        "30d" => Duration::days(30),
        _ => Duration::hours(24),
    }
}

#[utoipa::path(
        get,
        path = "/devices/{id}/usage",
        params(UsageQuery),
        responses(
            (status = 200, description = "Summed usage for the requested window", body = ErrorMessage),
            (status = 400, description = "Invalid device ID", body = ErrorMessage),
            (status = 404, description = "Device not found", body = ErrorMessage),
            (status = 500, description = "Internal Server Error", body = ErrorMessage),
        )
    )
]
pub async fn get_device_usage_handler(
    id: String,
    user: AuthedUser,
    query: UsageQuery,
    store: DeviceStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = parse_device_id(&id).map_err(|e| e.reject())?;

    let device = store.find_device(user.id, id).await.map_err(|e| e.reject())?;

    let range = query.range.unwrap_or_else(|| "24h".to_string());
    let to = Utc::now();
    let from = to - resolve_range(&range);

    let totals = store
        .usage_since(device.id, USAGE_EVENT, from)
        .await
        .map_err(|e| e.reject())?;

    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), json!(true));
    body.insert("device_id".to_string(), json!(device.id.to_hex()));
    body.insert(format!("total_units_last_{}", range), json!(totals.total));
    body.insert("range".to_string(), json!(range));
    body.insert("period".to_string(), json!({ "from": from, "to": to }));

    Ok(warp::reply::json(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_resolve_to_their_windows() {
        assert_eq!(resolve_range("1h"), Duration::hours(1));
        assert_eq!(resolve_range("24h"), Duration::hours(24));
        assert_eq!(resolve_range("7d"), Duration::days(7));
        assert_eq!(resolve_range("30d"), Duration::days(30));
    }

    #[test]
    fn unknown_tokens_fall_back_to_24h() {
        assert_eq!(resolve_range("90d"), Duration::hours(24));
        assert_eq!(resolve_range(""), Duration::hours(24));
        assert_eq!(resolve_range("1H"), Duration::hours(24));
    }
}
