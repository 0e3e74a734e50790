//! Metatags command - list sensors with the tags of one namespace

use anyhow::Result;
use commonsense_client::SenseClient;

use crate::output::{MetatagRow, OutputContext};

pub async fn metatags(client: &SenseClient, namespace: &str, ctx: &OutputContext) -> Result<()> {
    let tagged = client.get_sensors_metatags(namespace).await?;

    let rows: Vec<MetatagRow> = tagged.into_iter().map(MetatagRow::from).collect();
    ctx.print(&rows);
    Ok(())
}
