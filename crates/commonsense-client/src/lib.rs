//! CommonSense Client Library
//!
//! A typed HTTP client for the CommonSense sensor-data service: session
//! login/logout, sensor definitions, metatags and time-series data.
//!
//! # Example
//!
//! ```rust,no_run
//! use commonsense_client::{DataPoint, DataQuery, SenseClient, Sensor, SensorData};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = SenseClient::new()?;
//!     client.login("user", "md5-of-password").await?;
//!
//!     let sensor = Sensor::new("herp", "derp", "herpaderp", "float");
//!     let id = client.post_sensor(&sensor).await?;
//!
//!     let batch = SensorData::new(id.clone()).with_point(DataPoint::new("100", 1355321600.0));
//!     client.post_sensors_data(&[batch]).await?;
//!
//!     let points = client.get_sensor_data(&id, &DataQuery::new().last()).await?;
//!     println!("{:?}", points);
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router in-process so the client can be
//! exercised against a fake service:
//!
//! ```rust,ignore
//! use commonsense_client::testing::TestServer;
//!
//! let server = TestServer::start(mock_router()).await?;
//! let mut client = server.client()?;
//! ```

mod client;
mod config;
mod error;
mod query;
pub mod testing;
mod types;

pub use client::{SenseClient, SESSION_HEADER};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, DatePrecision, ServiceProfile,
    TimeoutsConfig, DEFAULT_BASE_URL, DEFAULT_DIAGNOSTICS_FILE,
};
pub use error::{Result, SenseClientError};
pub use query::{DataQuery, SensorListQuery, SortOrder};
pub use types::*;
