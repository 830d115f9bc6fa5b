//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Send DPA requests to a coordinator/node mesh
#[derive(Parser, Debug)]
#[command(name = "dpa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML). Defaults use the loopback device.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Response timeout for long-lasting operations, in milliseconds
    #[arg(short, long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a raw request frame given as hex, e.g. `01000603ffff`
    Request {
        /// Request frame: NADR, PNUM, PCMD, HWPID and data
        frame: String,
    },

    /// Pulse the red LED of one or more nodes
    Pulse {
        /// Node addresses, decimal or 0x-prefixed hex
        #[arg(required = true, num_args = 1.., value_parser = parse_address)]
        nodes: Vec<u16>,
    },

    /// Ask the coordinator for its bonded nodes
    Bonded,
}

/// Parse a node address in decimal or `0x` hex.
pub fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid node address '{}': {}", s, e))
}
