use clap::{Parser, Subcommand};

/// `scriptcron` - sandboxed scripts and cron jobs for AI agents.
#[derive(Parser, Debug)]
#[command(name = "scriptcron")]
#[command(version)]
#[command(about = "Run sandboxed Rhai scripts and schedule them with cron.", long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one script and print its result as JSON
    Run {
        /// Script name, without the `.rhai` extension
        name: String,

        /// Call this function instead of the top-level result
        #[arg(short, long)]
        function: Option<String>,

        /// Positional argument for --function, as JSON (repeatable)
        #[arg(short, long = "arg", value_name = "JSON", requires = "function")]
        args: Vec<String>,
    },

    /// List scripts with their descriptions and required secrets
    List,

    /// Show configured secret names (never values)
    Secrets,

    /// Run the scheduler until Ctrl-C
    Daemon,
}
