use std::path::{Path, PathBuf};

mod benchmark;
mod terminal;
mod validate;

use benchmark::Benchmark;
use clap::ArgAction;
use docres::{OptionOverrides, ResolverOptions};
use validate::Validate;

/// The options file looked for next to the root document.
const OPTIONS_FILE: &str = "docres.toml";

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Options file (defaults to `docres.toml` next to the root document)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(self.config.as_deref())
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Resolve a document and report any problems
    ///
    /// Exits with status 2 when the document is invalid.
    Validate(Validate),

    /// Resolve a document repeatedly from a cold cache and report timings
    Benchmark(Benchmark),
}

impl Command {
    fn run(self, config: Option<&Path>) -> anyhow::Result<()> {
        match self {
            Self::Validate(command) => command.run(config),
            Self::Benchmark(command) => command.run(config),
        }
    }
}

/// Limits shared by every command.
#[derive(Debug, Clone, Default, clap::Args)]
struct Limits {
    /// Maximum reference depth
    #[arg(long, value_name = "DEPTH")]
    max_depth: Option<usize>,

    /// Maximum size of a single file, in bytes
    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Allowed file extension (can be specified multiple times)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,
}

impl Limits {
    fn overrides(&self) -> OptionOverrides {
        OptionOverrides {
            max_file_size: self.max_file_size,
            max_depth: self.max_depth,
            allowed_file_extensions: (!self.extensions.is_empty())
                .then(|| self.extensions.clone()),
        }
    }
}

/// Loads resolver options for the document at `root`.
///
/// An explicit options file must exist. Without one, `docres.toml` next to
/// the root document is used if present, and the defaults otherwise.
fn load_options(config: Option<&Path>, root: &Path) -> anyhow::Result<ResolverOptions> {
    if let Some(path) = config {
        tracing::debug!("Loading options from {}", path.display());
        return Ok(ResolverOptions::load(path)?);
    }

    let implicit = root
        .parent()
        .map_or_else(|| PathBuf::from(OPTIONS_FILE), |dir| dir.join(OPTIONS_FILE));
    if implicit.is_file() {
        tracing::debug!("Loading options from {}", implicit.display());
        Ok(ResolverOptions::load(&implicit)?)
    } else {
        tracing::debug!("No options file found, using defaults");
        Ok(ResolverOptions::default())
    }
}
