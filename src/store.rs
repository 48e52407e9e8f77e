use crate::errors::{AppError, ErrorType};
use crate::models::{Device, DeviceStatus, DeviceType, Log};
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use log::error;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

pub struct NewDevice {
    pub name: String,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub metadata: Document,
}

#[derive(Debug, Default)]
pub struct DeviceChanges {
    pub name: Option<String>,
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
    pub metadata: Option<Document>,
}

#[derive(Debug, Default)]
pub struct DeviceFilter {
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
}

pub struct NewLog {
    pub event: String,
    pub value: Bson,
    pub metadata: Document,
}

#[derive(Debug, PartialEq)]
pub struct UsageTotals {
    pub total: f64,
    pub count: u64,
}

/// All registry/log-store operations go through here. Ownership is part of
/// every device query (`owner_id` in the filter), so a foreign device and a
/// missing one are the same `NotFound` to the caller.
pub struct DeviceStore {
    devices: Collection<Device>,
    logs: Collection<Log>,
}

impl DeviceStore {
    pub fn new(db: &Database) -> DeviceStore {
        DeviceStore {
            devices: db.collection("devices"),
            logs: db.collection("logs"),
        }
    }

    pub async fn create_device(
        &self,
        owner_id: ObjectId,
        new_device: NewDevice,
    ) -> Result<Device, AppError> {
        let now = Utc::now();
        let device = Device {
            id: ObjectId::new(),
            name: new_device.name,
            device_type: new_device.device_type,
            status: new_device.status,
            owner_id,
            last_active_at: None,
            metadata: new_device.metadata,
            created_at: now,
            updated_at: now,
        };

        self.devices
            .insert_one(&device, None)
            .await
            .map_err(|e| AppError::storage("Error creating device", e))?;

        Ok(device)
    }

    pub async fn list_devices(
        &self,
        owner_id: ObjectId,
        filter: DeviceFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Device>, u64), AppError> {
        let mut query = doc! { "owner_id": owner_id };
        if let Some(device_type) = filter.device_type {
            query.insert("type", device_type.as_str());
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(skip_for(page, limit))
            .limit(limit as i64)
            .build();

        let devices = self
            .devices
            .find(query.clone(), options)
            .await
            .map_err(|e| AppError::storage("Error fetching devices", e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::storage("Error fetching devices", e))?;

        let total = self
            .devices
            .count_documents(query, None)
            .await
            .map_err(|e| AppError::storage("Error fetching devices", e))?;

        Ok((devices, total))
    }

    pub async fn find_device(&self, owner_id: ObjectId, id: ObjectId) -> Result<Device, AppError> {
        self.devices
            .find_one(doc! { "_id": id, "owner_id": owner_id }, None)
            .await
            .map_err(|e| AppError::storage("Error fetching device", e))?
            .ok_or_else(|| AppError::new("Device not found", ErrorType::NotFound))
    }

    pub async fn update_device(
        &self,
        owner_id: ObjectId,
        id: ObjectId,
        changes: DeviceChanges,
    ) -> Result<Device, AppError> {
        let mut set = doc! { "updated_at": bson::DateTime::from_chrono(Utc::now()) };
        if let Some(name) = changes.name {
            set.insert("name", name);
        }
        if let Some(device_type) = changes.device_type {
            set.insert("type", device_type.as_str());
        }
        if let Some(status) = changes.status {
            set.insert("status", status.as_str());
        }
        if let Some(metadata) = changes.metadata {
            set.insert("metadata", metadata);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.devices
            .find_one_and_update(
                doc! { "_id": id, "owner_id": owner_id },
                doc! { "$set": set },
                options,
            )
            .await
            .map_err(|e| AppError::storage("Error updating device", e))?
            .ok_or_else(|| AppError::new("Device not found", ErrorType::NotFound))
    }

    /// Deletes the device first, then its logs. There is no cross-collection
    /// transaction here; a cascade failure after the device is gone surfaces
    /// as `PartialDelete` so the caller can tell the states diverged.
    pub async fn delete_device(&self, owner_id: ObjectId, id: ObjectId) -> Result<(), AppError> {
        let device = self.find_device(owner_id, id).await?;

        self.devices
            .delete_one(doc! { "_id": device.id }, None)
            .await
            .map_err(|e| AppError::storage("Error deleting device", e))?;

        self.logs
            .delete_many(doc! { "device_id": device.id }, None)
            .await
            .map_err(|e| {
                error!("Log cascade failed for device {}: {}", device.id, e);
                AppError::new(
                    "Device deleted but its logs could not be removed",
                    ErrorType::PartialDelete,
                )
            })?;

        Ok(())
    }

    /// The only path besides creation that touches `last_active_at`.
    pub async fn record_heartbeat(
        &self,
        owner_id: ObjectId,
        id: ObjectId,
        status: DeviceStatus,
    ) -> Result<DateTime<Utc>, AppError> {
        let now = Utc::now();
        let result = self
            .devices
            .update_one(
                doc! { "_id": id, "owner_id": owner_id },
                doc! { "$set": {
                    "status": status.as_str(),
                    "last_active_at": bson::DateTime::from_chrono(now),
                    "updated_at": bson::DateTime::from_chrono(now),
                }},
                None,
            )
            .await
            .map_err(|e| AppError::storage("Error recording heartbeat", e))?;

        if result.matched_count == 0 {
            return Err(AppError::new("Device not found", ErrorType::NotFound));
        }

        Ok(now)
    }

    pub async fn append_log(&self, device_id: ObjectId, new_log: NewLog) -> Result<Log, AppError> {
        let log = Log {
            id: ObjectId::new(),
            device_id,
            event: new_log.event,
            value: new_log.value,
            timestamp: Utc::now(),
            metadata: new_log.metadata,
        };

        self.logs
            .insert_one(&log, None)
            .await
            .map_err(|e| AppError::storage("Error creating log entry", e))?;

        Ok(log)
    }

    pub async fn list_logs(
        &self,
        device_id: ObjectId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Log>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .skip(skip_for(page, limit))
            .limit(limit as i64)
            .build();

        self.logs
            .find(doc! { "device_id": device_id }, options)
            .await
            .map_err(|e| AppError::storage("Error fetching logs", e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::storage("Error fetching logs", e))
    }

    pub async fn usage_since(
        &self,
        device_id: ObjectId,
        event: &str,
        start: DateTime<Utc>,
    ) -> Result<UsageTotals, AppError> {
        let pipeline = usage_pipeline(device_id, event, start);

        let mut cursor = self
            .logs
            .aggregate(pipeline, None)
            .await
            .map_err(|e| AppError::storage("Error fetching usage data", e))?;

        let totals = cursor
            .try_next()
            .await
            .map_err(|e| AppError::storage("Error fetching usage data", e))?
            .map(|doc| UsageTotals {
                total: doc.get("total").map(bson_to_f64).unwrap_or(0.0),
                count: doc.get("count").map(bson_to_u64).unwrap_or(0),
            })
            // No matching logs is a zero, not an error
            .unwrap_or(UsageTotals {
                total: 0.0,
                count: 0,
            });

        Ok(totals)
    }

    /// One bulk conditional update over the whole stale set. Devices that
    /// never sent a heartbeat have `last_active_at: null`, which a `$lt` date
    /// comparison never matches, so they are exempt from the sweep.
    pub async fn deactivate_stale_devices(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = self
            .devices
            .update_many(
                stale_device_filter(cutoff),
                doc! { "$set": {
                    "status": DeviceStatus::Inactive.as_str(),
                    "updated_at": bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await
            .map_err(|e| AppError::storage("Error deactivating inactive devices", e))?;

        Ok(result.modified_count)
    }
}

pub fn skip_for(page: u32, limit: u32) -> u64 {
    (page.saturating_sub(1) as u64) * (limit as u64)
}

pub fn stale_device_filter(cutoff: DateTime<Utc>) -> Document {
    doc! {
        "last_active_at": { "$lt": bson::DateTime::from_chrono(cutoff) },
        "status": { "$ne": DeviceStatus::Inactive.as_str() },
    }
}

fn usage_pipeline(device_id: ObjectId, event: &str, start: DateTime<Utc>) -> Vec<Document> {
    vec![
        doc! { "$match": {
            "device_id": device_id,
            "event": event,
            "timestamp": { "$gte": bson::DateTime::from_chrono(start) },
        }},
        doc! { "$group": {
            "_id": null,
            "total": { "$sum": "$value" },
            "count": { "$sum": 1 },
        }},
    ]
}

fn bson_to_f64(value: &Bson) -> f64 {
    match value {
        Bson::Double(v) => *v,
        Bson::Int32(v) => *v as f64,
        Bson::Int64(v) => *v as f64,
        _ => 0.0,
    }
}

fn bson_to_u64(value: &Bson) -> u64 {
    match value {
        Bson::Int32(v) => *v as u64,
        Bson::Int64(v) => *v as u64,
        Bson::Double(v) => *v as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn skip_is_offset_based() {
        assert_eq!(skip_for(1, 10), 0);
        assert_eq!(skip_for(2, 10), 10);
        assert_eq!(skip_for(3, 25), 50);
        // page 0 is treated as the first page, not an underflow
        assert_eq!(skip_for(0, 10), 0);
    }

    #[test]
    fn stale_filter_excludes_already_inactive() {
        let cutoff = Utc::now() - Duration::hours(24);
        let filter = stale_device_filter(cutoff);

        let last_active = filter.get_document("last_active_at").unwrap();
        assert!(matches!(last_active.get("$lt"), Some(Bson::DateTime(_))));

        let status = filter.get_document("status").unwrap();
        assert_eq!(status.get_str("$ne").unwrap(), "inactive");
    }

    #[test]
    fn usage_pipeline_matches_event_and_window() {
        let device_id = ObjectId::new();
        let start = Utc::now() - Duration::hours(1);
        let pipeline = usage_pipeline(device_id, "units_consumed", start);

        let matcher = pipeline[0].get_document("$match").unwrap();
        assert_eq!(matcher.get_object_id("device_id").unwrap(), device_id);
        assert_eq!(matcher.get_str("event").unwrap(), "units_consumed");
        assert!(matches!(
            matcher.get_document("timestamp").unwrap().get("$gte"),
            Some(Bson::DateTime(_))
        ));

        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get_document("total").unwrap().get_str("$sum").unwrap(), "$value");
    }

    #[test]
    fn aggregation_values_coerce_to_numbers() {
        assert_eq!(bson_to_f64(&Bson::Int32(5)), 5.0);
        assert_eq!(bson_to_f64(&Bson::Int64(8)), 8.0);
        assert_eq!(bson_to_f64(&Bson::Double(4.5)), 4.5);
        assert_eq!(bson_to_f64(&Bson::String("n/a".to_string())), 0.0);
        assert_eq!(bson_to_u64(&Bson::Int32(2)), 2);
    }
}
