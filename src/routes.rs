use crate::auth::with_auth;
use crate::handlers::device_handlers::{device, device_logs, device_usage, heartbeat};
use crate::store::DeviceStore;
use serde::de::DeserializeOwned;
use warp::Filter;

pub fn device_routes(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    create_device(db.clone())
        .or(get_devices(db.clone()))
        .or(update_device(db.clone()))
        .or(delete_device(db.clone()))
        .or(record_heartbeat(db.clone()))
        .or(create_log(db.clone()))
        .or(get_device_logs(db.clone()))
        .or(get_device_usage(db))
}

fn create_device(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices")
        .and(warp::post())
        .and(with_auth())
        .and(with_json_body())
        .and(with_store(db))
        .and_then(device::create_device_handler)
}

fn get_devices(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices")
        .and(warp::get())
        .and(with_auth())
        .and(warp::query::<device::DeviceListQuery>())
        .and(with_store(db))
        .and_then(device::get_devices_handler)
}

fn update_device(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String)
        .and(warp::patch())
        .and(with_auth())
        .and(with_json_body())
        .and(with_store(db))
        .and_then(device::update_device_handler)
}

fn delete_device(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String)
        .and(warp::delete())
        .and(with_auth())
        .and(with_store(db))
        .and_then(device::delete_device_handler)
}

fn record_heartbeat(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "heartbeat")
        .and(warp::post())
        .and(with_auth())
        .and(with_json_body())
        .and(with_store(db))
        .and_then(heartbeat::record_heartbeat_handler)
}

fn create_log(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "logs")
        .and(warp::post())
        .and(with_auth())
        .and(with_json_body())
        .and(with_store(db))
        .and_then(device_logs::create_log_handler)
}

fn get_device_logs(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "logs")
        .and(warp::get())
        .and(with_auth())
        .and(warp::query::<device_logs::LogListQuery>())
        .and(with_store(db))
        .and_then(device_logs::get_device_logs_handler)
}

fn get_device_usage(
    db: mongodb::Database,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("devices" / String / "usage")
        .and(warp::get())
        .and(with_auth())
        .and(warp::query::<device_usage::UsageQuery>())
        .and(with_store(db))
        .and_then(device_usage::get_device_usage_handler)
}

fn with_store(
    db: mongodb::Database,
) -> impl Filter<Extract = (DeviceStore,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || DeviceStore::new(&db))
}

fn with_json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(1024 * 16).and(warp::body::json())
}
