//! Smoke command - walk through the main API calls once
//!
//! Every step reports its own failure and the walk carries on, so one run
//! shows which parts of the service respond.

use anyhow::Result;
use commonsense_client::{DataPoint, SenseClient, Sensor, SensorData};

use crate::output::{OutputContext, SensorRow};

/// Date of the sample point (2012-12-12T14:13:20Z)
const SAMPLE_DATE: f64 = 1355321600.0;

pub async fn smoke(client: &SenseClient, ctx: &OutputContext) -> Result<()> {
    match client.get_all_sensors().await {
        Ok(sensors) => {
            let rows: Vec<SensorRow> = sensors.into_iter().map(SensorRow::from).collect();
            ctx.print(&rows);
        }
        Err(e) => ctx.error(&format!("GetAllSensors failed: {}", e)),
    }

    let sensor = Sensor::new("herp", "derp", "herpaderp", "float");
    let id = match client.post_sensor(&sensor).await {
        Ok(id) => {
            ctx.info(&format!("Sensor id {}", id));
            Some(id)
        }
        Err(e) => {
            ctx.error(&format!("PostSensor failed: {}", e));
            None
        }
    };

    if let Some(id) = id {
        let batch = SensorData::new(id).with_point(DataPoint::new("100", SAMPLE_DATE));
        match client.post_sensors_data(&[batch]).await {
            Ok(()) => ctx.success("PostSensorData succeeded"),
            Err(e) => ctx.error(&format!("PostSensorData failed: {}", e)),
        }
    }

    Ok(())
}
