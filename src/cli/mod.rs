pub mod handlers;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `stepgate` - gated, resumable plan execution.
#[derive(Parser, Debug)]
#[command(name = "stepgate")]
#[command(version)]
#[command(about = "Check actions against guardrails and walk plans step by step.", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.stepgate/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one action through the guardrail and print the verdict
    Check {
        /// Action (tool) name
        action: String,

        /// Parameter as key=value; values that parse as JSON are kept typed
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Treat the action as already confirmed by the user
        #[arg(long)]
        confirmed: bool,
    },

    /// Draft a plan for a goal with the keyword planner and print it as JSON
    Plan {
        /// What the plan should accomplish
        goal: String,

        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a plan file for structural problems
    Validate {
        /// Plan JSON file
        path: PathBuf,
    },

    /// Execute a plan file with dry-run tools, asking before gated steps
    Run {
        /// Plan JSON file
        #[arg(required_unless_present = "resume")]
        path: Option<PathBuf>,

        /// Continue a saved snapshot that stopped at a confirmation
        #[arg(long, value_name = "PLAN_ID", conflicts_with = "path")]
        resume: Option<String>,

        /// Approve every confirmation without asking
        #[arg(long)]
        yes: bool,
    },

    /// List plan snapshots saved by `run`
    Snapshots,
}
