use log::error;
use serde::Serialize;
use std::convert::Infallible;
use utoipa::ToSchema;
use warp::{http::StatusCode, Rejection, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Validation,
    InvalidId,
    NotFound,
    Auth,
    Storage,
    /// Device delete succeeded but the log cascade failed; registry and
    /// log-store states have diverged.
    PartialDelete,
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub err_type: ErrorType,
}

impl AppError {
    pub fn new(message: &str, err_type: ErrorType) -> AppError {
        AppError {
            message: message.to_string(),
            err_type,
        }
    }

    /// Storage failures keep the driver detail in the log, the caller only
    /// sees the generic message.
    pub fn storage(message: &str, err: mongodb::error::Error) -> AppError {
        error!("{}: {}", message, err);
        AppError::new(message, ErrorType::Storage)
    }

    pub fn status_code(&self) -> StatusCode {
        match self.err_type {
            ErrorType::Validation | ErrorType::InvalidId => StatusCode::BAD_REQUEST,
            ErrorType::Auth => StatusCode::UNAUTHORIZED,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Storage | ErrorType::PartialDelete => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

impl warp::reject::Reject for AppError {}

// Error body for every non-2xx response
#[derive(Serialize, ToSchema)]
pub struct ErrorMessage {
    pub success: bool,
    pub message: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Route not found".to_string())
    } else if let Some(app_err) = err.find::<AppError>() {
        (app_err.status_code(), app_err.message.clone())
    } else if let Some(body_err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, body_err.to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            "Authorization header is required".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorMessage {
        success: false,
        message,
    });

    Ok(warp::reply::with_status(json, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::Filter;

    fn rejecting_filter(
        err_type: ErrorType,
        message: &'static str,
    ) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
        warp::any().and_then(move || async move {
            Err::<String, Rejection>(AppError::new(message, err_type).reject())
        })
    }

    async fn reply_for(err_type: ErrorType, message: &'static str) -> (StatusCode, serde_json::Value) {
        let filter = rejecting_filter(err_type, message).recover(handle_rejection);
        let res = warp::test::request().reply(&filter).await;
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        (res.status(), body)
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, body) = reply_for(ErrorType::NotFound, "Device not found").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Device not found");
    }

    #[tokio::test]
    async fn invalid_id_maps_to_400() {
        let (status, body) = reply_for(ErrorType::InvalidId, "Invalid device ID").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid device ID");
    }

    #[tokio::test]
    async fn validation_maps_to_400() {
        let (status, _) = reply_for(ErrorType::Validation, "Device name is required").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_maps_to_401() {
        let (status, _) = reply_for(ErrorType::Auth, "Authorization token invalid or expired").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn storage_and_partial_delete_map_to_500() {
        let (status, _) = reply_for(ErrorType::Storage, "Error fetching devices").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) =
            reply_for(ErrorType::PartialDelete, "Device deleted but its logs could not be removed")
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["message"],
            "Device deleted but its logs could not be removed"
        );
    }

    #[tokio::test]
    async fn unknown_route_maps_to_404() {
        let filter = warp::path!("known").map(|| "ok").recover(handle_rejection);
        let res = warp::test::request().path("/unknown").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
