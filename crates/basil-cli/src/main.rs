//! Basil command-line tool
//!
//! Reads IR modules serialized as JSON and drives the core: code generation,
//! IR dumps, CFG rendering and backend listing. All file I/O happens here.

mod commands;
mod logger;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "basil")]
#[command(about = "Basil IR optimizer and source-to-source code generator", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize IR modules and generate target source
    Emit {
        /// IR modules (JSON); several are compiled in dependency order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Backend name or alias (csharp, cpp, python, ...)
        #[arg(short, long)]
        target: String,
        /// Configuration file (basil.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Optimization level: none, standard, full (overrides the config)
        #[arg(short = 'O', long = "opt-level")]
        opt_level: Option<String>,
        /// Output file, or directory when compiling several modules
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the canonical IR listing
    Dump {
        /// IR module (JSON)
        input: PathBuf,
        /// Run the optimizer before printing
        #[arg(long)]
        optimized: bool,
        /// Configuration file (basil.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Optimization level used with --optimized
        #[arg(short = 'O', long = "opt-level")]
        opt_level: Option<String>,
    },

    /// Render a function's control-flow graph with dominance and loop facts
    Cfg {
        /// IR module (JSON)
        input: PathBuf,
        /// Function to render
        #[arg(short, long)]
        function: String,
        /// Output format: dot or json
        #[arg(long, default_value = "dot")]
        format: String,
        /// Run the optimizer first
        #[arg(long)]
        optimized: bool,
    },

    /// List registered backends and their aliases
    Targets,
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);
    let mut out = output::StyledOutput::new(output::resolve_color_choice(cli.color.as_deref()));

    let result = match cli.command {
        Commands::Emit {
            inputs,
            target,
            config,
            opt_level,
            output,
        } => commands::emit::execute(inputs, target, config, opt_level, output),
        Commands::Dump {
            input,
            optimized,
            config,
            opt_level,
        } => commands::dump::execute(input, optimized, config, opt_level),
        Commands::Cfg {
            input,
            function,
            format,
            optimized,
        } => commands::cfg::execute(input, function, format, optimized),
        Commands::Targets => commands::targets::execute(&mut out),
    };

    if let Err(e) = result {
        out.error("error");
        out.plain_err(&format!(": {:#}\n", e));
        std::process::exit(1);
    }
}
