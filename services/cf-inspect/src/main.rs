//! cf-inspect: print the coordinate roles and classification of a CF
//! dataset and summarize the mesh generated from it.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cf_inspect::{run, write_report, Args};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so the report can be piped.
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let report = run(&args)?;
    if args.output.is_some() {
        print!("{}", report.describe());
    } else {
        eprint!("{}", report.describe());
    }
    write_report(&report, args.output.as_deref())?;
    Ok(())
}
