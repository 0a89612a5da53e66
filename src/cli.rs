// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use speededitor_driver::sink::Backend;

#[derive(Parser)]
#[command(name = "speededitor-driver")]
#[command(author, version, about = "Blackmagic Speed Editor Linux driver")]
pub struct Cli {
    /// Input injection backend
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    pub backend: Backend,

    /// TOML file overriding the built-in key bindings
    #[arg(long, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides this)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected HID devices (diagnostics)
    #[command(visible_alias = "ls")]
    List,
}
