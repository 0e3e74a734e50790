//! Sensor commands - list, create and delete sensor definitions

use anyhow::{Context, Result};
use commonsense_client::{SenseClient, Sensor};

use crate::output::{OutputContext, SensorRow};

/// List owned sensors
pub async fn sensors(client: &SenseClient, all: bool, ctx: &OutputContext) -> Result<()> {
    let sensors = if all {
        client.try_get_all_sensors().await?
    } else {
        client.get_sensors().await?
    };

    let rows: Vec<SensorRow> = sensors.into_iter().map(SensorRow::from).collect();
    ctx.print(&rows);
    Ok(())
}

/// Create a sensor and print its id
pub async fn create(client: &SenseClient, sensor: &Sensor, ctx: &OutputContext) -> Result<()> {
    let id = client
        .post_sensor(sensor)
        .await
        .context("Failed to create sensor")?;

    ctx.success(&format!("Created sensor {} with id {}", sensor.name, id));
    Ok(())
}

/// Delete a sensor
pub async fn delete(client: &SenseClient, id: &str, ctx: &OutputContext) -> Result<()> {
    client
        .delete_sensor(id)
        .await
        .with_context(|| format!("Failed to delete sensor {}", id))?;

    ctx.success(&format!("Deleted sensor {}", id));
    Ok(())
}
