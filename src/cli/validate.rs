use std::path::{Path, PathBuf};

use clap::Parser;
use docres::{Resolver, ValidationResult};
use tracing::instrument;

use super::{Limits, load_options, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Validate {
    /// The root document
    root: PathBuf,

    #[command(flatten)]
    pub(super) limits: Limits,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, config: Option<&Path>) -> anyhow::Result<()> {
        let options = load_options(config, &self.root)?;
        let mut resolver = Resolver::new(options);

        let result = resolver.validate_with(&self.root, &self.limits.overrides());

        match self.output {
            OutputFormat::Table => print_table(&result),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        }

        if !result.is_valid {
            std::process::exit(2);
        }

        Ok(())
    }
}

fn print_table(result: &ValidationResult) {
    if let Some(resolution) = &result.file_resolution {
        let metrics = &resolution.performance_metrics;
        println!(
            "{}",
            format!(
                "{} fragments resolved, {} files read ({} bytes, {:.3} ms)",
                resolution.resolved.len(),
                metrics.total_files,
                metrics.total_size_bytes,
                metrics.total_load_time_ms
            )
            .info()
        );

        for (path, summary) in &resolution.resolved {
            let title = summary
                .title
                .as_deref()
                .map_or_else(String::new, |title| format!(" {title}"));
            println!(
                "  {}{} {}",
                path.display(),
                title,
                format!(
                    "(depth {}, {} refs, {} bytes)",
                    summary.depth, summary.reference_count, summary.size_bytes
                )
                .dim()
            );
        }

        for cycle in &resolution.circular_references {
            println!("{} {cycle}", "cycle:".warning());
        }
    }

    for error in &result.errors {
        let location = if error.pointer.is_empty() {
            String::new()
        } else {
            format!(" at {}", error.pointer)
        };
        println!(
            "{} {}{}",
            format!("[{}]", error.kind).warning(),
            error.message,
            location.dim()
        );
    }

    if result.is_valid {
        println!("{}", "✓ Document is valid".success());
    } else {
        println!(
            "{}",
            format!("✗ Document is invalid ({} errors)", result.errors.len()).warning()
        );
    }
}
