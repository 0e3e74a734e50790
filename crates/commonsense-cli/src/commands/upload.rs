//! Upload command - send one data point

use anyhow::{Context, Result};
use chrono::Utc;
use commonsense_client::{DataPoint, SenseClient, SensorData};

use crate::output::OutputContext;

/// Upload `value` for sensor `id`, stamped now unless `date` is given
pub async fn upload(
    client: &SenseClient,
    id: &str,
    value: &str,
    date: Option<f64>,
    ctx: &OutputContext,
) -> Result<()> {
    let point = match date {
        Some(date) => DataPoint::new(value, date),
        None => DataPoint::at(value, Utc::now()),
    };
    let batch = SensorData::new(id).with_point(point);

    client
        .post_sensors_data(&[batch])
        .await
        .context("Failed to upload data")?;

    ctx.success(&format!("Uploaded {} to sensor {}", value, id));
    Ok(())
}
