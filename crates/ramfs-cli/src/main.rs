mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code_for, resolve_config, Overrides};
use ramfs_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ramfs",
    version,
    about = "Build reproducible initramfs archives from Go sources"
)]
struct Cli {
    /// Build configuration file (default: ./ramfs.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// Glob patterns relative to GOPATH selecting the seed packages.
    patterns: Vec<String>,
    /// Toolchain backend: "go" or "mock".
    #[arg(long)]
    toolchain: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an initramfs archive.
    Build {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Keep the init from the seed archive instead of building one.
        #[arg(long, default_value_t = false)]
        useinit: bool,
        /// Seed archive whose records are copied in first.
        #[arg(long)]
        cpio: Option<PathBuf>,
        /// Parent directory for the scratch build directory.
        #[arg(long)]
        tmpdir: Option<PathBuf>,
        /// Where to write the archive.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the dependency closure of the seed packages without building.
    Resolve {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List the records of a newc archive.
    List {
        /// Archive to read.
        archive: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RAMFS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let json = cli.json;
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Build {
            selection,
            useinit,
            cpio,
            tmpdir,
            output,
        } => resolve_config(
            config_path,
            Overrides {
                patterns: selection.patterns,
                use_existing_init: useinit,
                initial_cpio: cpio,
                tmpdir,
                output,
                toolchain: selection.toolchain,
            },
        )
        .and_then(|config| commands::build::run(config, json)),
        Commands::Resolve { selection } => resolve_config(
            config_path,
            Overrides {
                patterns: selection.patterns,
                toolchain: selection.toolchain,
                ..Overrides::default()
            },
        )
        .and_then(|config| commands::resolve::run(config, json)),
        Commands::List { archive } => commands::list::run(&archive, json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
