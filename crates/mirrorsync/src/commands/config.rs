//! Config command

use anyhow::Result;
use mirrorsync_core::RuntimeConfig;

use crate::cli::{ConfigCommands, ConfigShowArgs};

pub fn run(cmd: ConfigCommands, config: &RuntimeConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config),
    }
}

fn show(args: ConfigShowArgs, config: &RuntimeConfig) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", serde_yaml_ng::to_string(config)?);
    }

    Ok(())
}
