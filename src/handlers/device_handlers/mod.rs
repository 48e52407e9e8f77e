pub mod device;
pub mod device_logs;
pub mod device_usage;
pub mod heartbeat;

use crate::errors::{AppError, ErrorType};
use bson::oid::ObjectId;

/// A malformed id is its own client error, never escalated to "not found".
pub fn parse_device_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::new("Invalid device ID", ErrorType::InvalidId))
}
