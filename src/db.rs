use crate::models::{Device, Log};
use mongodb::{
    bson::doc,
    options::{ClientOptions, ResolverConfig},
    Client, Collection, IndexModel,
};
use std::env;

pub async fn get_db() -> mongodb::error::Result<mongodb::Database> {
    // Load the MongoDB connection string from an environment variable:
    let client_uri =
        env::var("MONGODB_URI").expect("You must set the MONGODB_URI environment var!");

    // A Client is needed to connect to MongoDB:
    // An extra line of code to work around a DNS issue on Windows:
    let options =
        ClientOptions::parse_with_resolver_config(&client_uri, ResolverConfig::cloudflare())
            .await?;
    let client = Client::with_options(options)?;

    Ok(client.database("devicehub"))
}

// Compound indexes backing the list filters and the log/usage queries
pub async fn ensure_indexes(db: &mongodb::Database) -> mongodb::error::Result<()> {
    let devices: Collection<Device> = db.collection("devices");
    devices
        .create_index(
            IndexModel::builder()
                .keys(doc! { "owner_id": 1, "type": 1, "status": 1 })
                .build(),
            None,
        )
        .await?;
    devices
        .create_index(
            IndexModel::builder().keys(doc! { "last_active_at": 1 }).build(),
            None,
        )
        .await?;

    let logs: Collection<Log> = db.collection("logs");
    logs.create_index(
        IndexModel::builder()
            .keys(doc! { "device_id": 1, "timestamp": -1 })
            .build(),
        None,
    )
    .await?;
    logs.create_index(
        IndexModel::builder()
            .keys(doc! { "event": 1, "timestamp": -1 })
            .build(),
        None,
    )
    .await?;

    Ok(())
}
