//! Data command - read data points

use anyhow::Result;
use commonsense_client::{DataQuery, SenseClient};

use crate::output::{DataRow, OutputContext};

/// Read data points of one or more sensors
pub async fn data(
    client: &SenseClient,
    ids: &[String],
    query: &DataQuery,
    ctx: &OutputContext,
) -> Result<()> {
    let rows: Vec<DataRow> = if let [id] = ids {
        client
            .get_sensor_data(id, query)
            .await?
            .into_iter()
            .map(|p| DataRow::new(id, p))
            .collect()
    } else {
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        client
            .get_sensors_data(&ids, query)
            .await?
            .into_iter()
            .map(|p| DataRow::new("", p))
            .collect()
    };

    ctx.print(&rows);
    Ok(())
}
