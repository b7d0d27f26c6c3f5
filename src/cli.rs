use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackplan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Plan and apply per-stage infrastructure resource graphs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stage configuration file (default: ~/.config/stackplan/stages.toml)
    #[arg(long, env = "STACKPLAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured stages and their parameters
    Stages,

    /// Build and resolve stage graphs, printing the apply order
    Plan(PlanArgs),

    /// Print the nodes and edges of one stage
    Graph {
        /// Stage name
        stage: String,
    },

    /// Compare the graphs of two stages
    Diff {
        /// Stage to compare from
        from: String,
        /// Stage to compare to
        to: String,
    },

    /// Apply stage graphs through the local state-file backend
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Stage Selection
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct StageSelection {
    /// Stages to use (default: all configured stages)
    pub stages: Vec<String>,

    /// Use every configured stage
    #[arg(long, conflicts_with = "stages")]
    pub all: bool,
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub selection: StageSelection,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Group the plan into dependency waves
    #[arg(short, long)]
    pub waves: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub selection: StageSelection,

    /// Show what would be applied without recording anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Parallel jobs within a wave
    #[arg(short, long, default_value = "4")]
    pub jobs: u32,

    /// Keep resources that left the graph in the state file
    #[arg(long)]
    pub no_prune: bool,

    /// State directory (default: ~/.local/state/stackplan)
    #[arg(long)]
    pub state_dir: Option<String>,
}
