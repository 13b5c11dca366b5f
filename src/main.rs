use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use log::{error, info, LevelFilter};

use scraper::{Catalog, Config, Outcome, Query, ValidationError, DEFAULT_RETRY};

mod output;

/// Downloads the course catalog matching a query and saves it as CSV.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Course name to look up (empty for all)
    #[arg(short = 'c', long = "coursename", default_value = "")]
    course_name: String,

    /// Teacher name to look up (empty for all)
    #[arg(short = 't', long = "teachername", default_value = "")]
    teacher_name: String,

    /// Course type code (0 for all)
    #[arg(short = 's', long = "coursetype", default_value = "0")]
    course_type: String,

    /// School/department code (0 for all)
    #[arg(short = 'y', long = "yuanxi", default_value = "0")]
    department: String,

    /// Max number of retries before giving up
    #[arg(short, long, default_value_t = DEFAULT_RETRY)]
    retry: u32,

    /// Console log level: 0 trace, 1 debug, 2 info, 3 warning, 4 error, 5 critical
    #[arg(short = 'l', long = "loglevel", default_value_t = 2)]
    log_level: u8,

    /// Overwrite the output file if it already exists
    #[arg(short, long)]
    force: bool,

    /// Concurrent page requests (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Directory the CSV file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Year and semester, e.g. 22-23-1 for the first semester of 2022-2023
    term: String,
}

impl Args {
    fn level_filter(&self) -> LevelFilter {
        match self.log_level {
            0 => LevelFilter::Trace,
            1 => LevelFilter::Debug,
            2 => LevelFilter::Info,
            3 => LevelFilter::Warn,
            4 | 5 => LevelFilter::Error,
            _ => LevelFilter::Off,
        }
    }

    fn query(&self) -> Query {
        Query::new(&self.term)
            .with_course_name(&self.course_name)
            .with_teacher_name(&self.teacher_name)
            .with_course_type(&self.course_type)
            .with_department(&self.department)
    }

    fn config(&self) -> Config {
        let defaults = Config::default();
        Config {
            retry: self.retry,
            workers: self.workers.unwrap_or(defaults.workers).max(1),
            timeout: Duration::from_secs(self.timeout),
            ..defaults
        }
    }
}

fn report_invalid(e: &ValidationError) {
    match e {
        ValidationError::UnknownDepartment { valid, .. }
        | ValidationError::UnknownCourseType { valid, .. } => {
            error!("valid values and meanings are:");
            for (code, label) in valid {
                error!("{code}: {label}");
            }
        }
        _ => {}
    }
    error!("{e}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.level_filter())
        .parse_default_env()
        .init();

    let query = args.query();
    let config = args.config();
    let retry = config.retry;
    let catalog = Catalog::dean(config)?;

    info!("querying {query}");
    if let Err(e) = catalog.validate(&query, retry).await {
        report_invalid(&e);
        error!("invalid query parameters, aborting");
        return Ok(());
    }

    let path = args.output_dir.join(format!("{query}.csv"));
    if path.exists() && !args.force {
        info!(
            "{} already exists, use -f to overwrite it",
            path.display()
        );
        return Ok(());
    }

    let report = match catalog.fetch_all(&query, retry).await {
        Ok(Outcome::Fetched(report)) => report,
        Ok(Outcome::NoResults) => {
            info!("no matching courses, nothing to save");
            return Ok(());
        }
        Err(e) => {
            error!("{e}, aborting");
            return Ok(());
        }
    };

    if !report.is_complete() {
        error!(
            "{} of {} courses missing, failed pages start at rows {}",
            report.total.saturating_sub(report.rows.len()),
            report.total,
            report.failed.iter().join(", ")
        );
    }

    if report.rows.is_empty() {
        error!("no page could be fetched, nothing to save");
        return Ok(());
    }

    output::save(&path, report.rows)?;
    info!("saved to {}", path.display());

    Ok(())
}
