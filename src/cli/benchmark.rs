use std::path::{Path, PathBuf};

use clap::Parser;
use docres::{BenchmarkReport, Resolver};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::instrument;

use super::{Limits, load_options, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Benchmark {
    /// The root document
    root: PathBuf,

    /// Number of cold-cache runs
    #[arg(long, short = 'n', default_value_t = 10)]
    iterations: usize,

    #[command(flatten)]
    limits: Limits,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Benchmark {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, config: Option<&Path>) -> anyhow::Result<()> {
        let options = load_options(config, &self.root)?;
        let mut resolver = Resolver::new(options);

        let progress = ProgressBar::new(u64::try_from(self.iterations).unwrap_or(u64::MAX));
        progress.set_style(ProgressStyle::with_template(
            "{bar:40} {pos}/{len} iterations ({elapsed})",
        )?);

        let report = resolver.benchmark_with(
            &self.root,
            self.iterations,
            &self.limits.overrides(),
            |_| progress.inc(1),
        );
        progress.finish_and_clear();
        let report = report?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_summary(&report);
        }

        Ok(())
    }
}

fn print_summary(report: &BenchmarkReport) {
    let average = &report.average;
    let failed = report.iterations.iter().filter(|run| !run.is_valid).count();

    println!(
        "{}",
        format!("{} iterations", report.iterations.len()).info()
    );
    println!("  average time:   {:.3} ms", average.elapsed_ms);
    println!("  files per run:  {:.1}", average.total_files);
    println!("  bytes per run:  {:.0}", average.total_size_bytes);
    println!("  load time:      {:.3} ms", average.total_load_time_ms);
    println!("  slowest load:   {:.3} ms", average.max_file_load_time_ms);

    if let Some(delta) = report.memory.delta_bytes {
        println!("  memory delta:   {delta} bytes");
    } else {
        println!("  {}", "memory usage unavailable".dim());
    }

    if failed > 0 {
        println!(
            "{}",
            format!("{failed} iterations produced an invalid document").warning()
        );
    }
}
