//! `bran tools` - list the tools the server exposes.

use anyhow::Result;
use clap::Args;

use super::{Context, ServerArgs};

#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let client = args.server.connect().await?;
    let tools = client.list_tools().await;
    client.shutdown().await.ok();
    let tools = tools?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if tools.is_empty() {
        println!("no tools exposed");
        return Ok(());
    }

    for tool in &tools {
        match &tool.description {
            Some(description) => println!("{}  {}", tool.name, description),
            None => println!("{}", tool.name),
        }
    }

    Ok(())
}
