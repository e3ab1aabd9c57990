use std::path::PathBuf;

use alloy_primitives::B256;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Registry configuration file (YAML)
    #[arg(long, global = true, env = "GUARDIAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute the deposit root of a list of leaves
    #[command(name = "deposit-root")]
    DepositRoot(DepositRootCommand),

    /// Repair a deposit events dump and check it against a deposit root
    #[command(name = "verify-cache")]
    VerifyCache(VerifyCacheCommand),
}

#[derive(Debug, Parser)]
pub struct DepositRootCommand {
    /// File with one hex encoded leaf per line
    #[arg(long)]
    pub leaves: PathBuf,
}

#[derive(Debug, Parser)]
pub struct VerifyCacheCommand {
    /// JSON array of deposit events
    #[arg(long)]
    pub dump: PathBuf,

    /// Deposit root the repaired events must reproduce
    #[arg(long)]
    pub expected_root: B256,

    /// Chain the events come from, used to check deposit signatures
    #[arg(long, env = "GUARDIAN_CHAIN_ID", default_value_t = 1)]
    pub chain_id: u64,

    /// Re-verify the BLS signature of every deposit
    #[arg(long)]
    pub check_signatures: bool,
}
