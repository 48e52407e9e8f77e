pub mod device_handlers;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
            device_handlers::device::create_device_handler,
            device_handlers::device::get_devices_handler,
            device_handlers::device::update_device_handler,
            device_handlers::device::delete_device_handler,
            device_handlers::heartbeat::record_heartbeat_handler,
            device_handlers::device_logs::create_log_handler,
            device_handlers::device_logs::get_device_logs_handler,
            device_handlers::device_usage::get_device_usage_handler,
        )
    )
]
pub struct DevicehubApi;
