use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bson date round-trip for nullable timestamps. `last_active_at` must be a
/// real bson Date (not a string) or `$lt` comparisons in the sweeper silently
/// match nothing.
pub mod opt_chrono_datetime_as_bson_datetime {
    use bson::DateTime as BsonDateTime;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => BsonDateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<BsonDateTime>::deserialize(deserializer)?;
        Ok(value.map(|dt| dt.to_chrono()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Thermostat,
    Camera,
    Sensor,
    SmartMeter,
    Switch,
    Other,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Light => "light",
            DeviceType::Thermostat => "thermostat",
            DeviceType::Camera => "camera",
            DeviceType::Sensor => "sensor",
            DeviceType::SmartMeter => "smart_meter",
            DeviceType::Switch => "switch",
            DeviceType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
            DeviceStatus::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Device {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub owner_id: ObjectId,
    #[serde(with = "opt_chrono_datetime_as_bson_datetime")]
    pub last_active_at: Option<DateTime<Utc>>,
    pub metadata: Document,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Log {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub device_id: ObjectId,
    pub event: String,
    pub value: Bson,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub metadata: Document,
}

// Records as the API returns them: `id` as a hex string, no `_id`, dates as
// RFC 3339 strings.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub owner_id: String,
    pub last_active_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> DeviceResponse {
        DeviceResponse {
            id: device.id.to_hex(),
            name: device.name,
            device_type: device.device_type,
            status: device.status,
            owner_id: device.owner_id.to_hex(),
            last_active_at: device.last_active_at,
            metadata: Bson::Document(device.metadata).into(),
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub id: String,
    pub device_id: String,
    pub event: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

impl From<Log> for LogResponse {
    fn from(log: Log) -> LogResponse {
        LogResponse {
            id: log.id.to_hex(),
            device_id: log.device_id.to_hex(),
            event: log.event,
            value: log.value.into(),
            timestamp: log.timestamp,
            metadata: Bson::Document(log.metadata).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn device_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(DeviceType::SmartMeter).unwrap(),
            serde_json::json!("smart_meter")
        );
        let parsed: DeviceType = serde_json::from_value(serde_json::json!("thermostat")).unwrap();
        assert_eq!(parsed, DeviceType::Thermostat);
        assert!(serde_json::from_value::<DeviceType>(serde_json::json!("toaster")).is_err());
    }

    #[test]
    fn device_status_matches_wire_strings() {
        for status in [
            DeviceStatus::Active,
            DeviceStatus::Inactive,
            DeviceStatus::Maintenance,
        ] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, serde_json::json!(status.as_str()));
        }
    }

    #[test]
    fn device_response_exposes_id_not_underscore_id() {
        let device = Device {
            id: ObjectId::new(),
            name: "kitchen lamp".to_string(),
            device_type: DeviceType::Light,
            status: DeviceStatus::Active,
            owner_id: ObjectId::new(),
            last_active_at: None,
            metadata: doc! { "room": "kitchen" },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let hex = device.id.to_hex();

        let json = serde_json::to_value(DeviceResponse::from(device)).unwrap();
        assert_eq!(json["id"], serde_json::json!(hex));
        assert!(json.get("_id").is_none());
        assert_eq!(json["type"], serde_json::json!("light"));
        assert_eq!(json["last_active_at"], serde_json::Value::Null);
        assert_eq!(json["metadata"]["room"], serde_json::json!("kitchen"));
    }

    #[test]
    fn device_round_trips_through_bson() {
        let device = Device {
            id: ObjectId::new(),
            name: "meter".to_string(),
            device_type: DeviceType::SmartMeter,
            status: DeviceStatus::Maintenance,
            owner_id: ObjectId::new(),
            last_active_at: Some(Utc::now()),
            metadata: doc! {},
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let doc = bson::to_document(&device).unwrap();
        // Dates must be stored as bson dates, not strings
        assert!(matches!(doc.get("last_active_at"), Some(Bson::DateTime(_))));
        assert!(matches!(doc.get("created_at"), Some(Bson::DateTime(_))));
        assert_eq!(doc.get_str("type").unwrap(), "smart_meter");
        assert_eq!(doc.get_str("status").unwrap(), "maintenance");

        let back: Device = bson::from_document(doc).unwrap();
        assert_eq!(back.id, device.id);
        assert_eq!(back.device_type, DeviceType::SmartMeter);
        assert!(back.last_active_at.is_some());
    }

    #[test]
    fn never_seen_device_stores_null_last_active_at() {
        let device = Device {
            id: ObjectId::new(),
            name: "cam".to_string(),
            device_type: DeviceType::Camera,
            status: DeviceStatus::Active,
            owner_id: ObjectId::new(),
            last_active_at: None,
            metadata: doc! {},
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let doc = bson::to_document(&device).unwrap();
        assert_eq!(doc.get("last_active_at"), Some(&Bson::Null));
    }

    #[test]
    fn log_response_keeps_structured_values() {
        let log = Log {
            id: ObjectId::new(),
            device_id: ObjectId::new(),
            event: "units_consumed".to_string(),
            value: Bson::Double(4.5),
            timestamp: Utc::now(),
            metadata: doc! { "source": "meter" },
        };

        let json = serde_json::to_value(LogResponse::from(log)).unwrap();
        assert_eq!(json["event"], serde_json::json!("units_consumed"));
        assert_eq!(json["value"], serde_json::json!(4.5));
        assert!(json.get("_id").is_none());
    }
}
