use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rtrack_sync::{BackfillConfig, BackfillPipeline, BackfillSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rtrack")]
#[command(about = "Backfill follow-up applications into the recruitment tracker store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Synthesize one additional application for a sample of existing candidates (default)
    Backfill(BackfillArgs),
    /// Print store row counts without writing anything
    Stats {
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[derive(Debug, Args, Default)]
struct BackfillArgs {
    /// SQLite store URL, e.g. sqlite://backend/database/recruitment.db
    #[arg(long)]
    database_url: Option<String>,
    /// Number of candidates to sample
    #[arg(long)]
    sample_size: Option<usize>,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
    /// AI score a candidate must reach to be tested
    #[arg(long)]
    eligibility_threshold: Option<f64>,
    /// Roll back instead of committing
    #[arg(long)]
    dry_run: bool,
}

impl BackfillArgs {
    fn apply(self, mut config: BackfillConfig) -> BackfillConfig {
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(threshold) = self.eligibility_threshold {
            config.eligibility_threshold = threshold;
        }
        config.dry_run |= self.dry_run;
        config
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))
}

fn print_summary(summary: &BackfillSummary) {
    let rule = "=".repeat(60);
    println!("{rule}");
    if summary.committed {
        println!("backfill complete: run_id={}", summary.run_id);
    } else {
        println!("dry run complete (rolled back): run_id={}", summary.run_id);
    }
    println!("{rule}");
    println!("Job roles loaded:            {}", summary.job_roles);
    println!("Candidates loaded:           {}", summary.candidates);
    println!("Candidates sampled:          {}", summary.sampled_candidates);
    println!("Skipped (no open roles):     {}", summary.skipped_candidates);
    println!("New applications:            {}", summary.applications);
    println!("New AI analyses:             {}", summary.analyses);
    println!("New tests:                   {}", summary.tests);
    println!("New decisions:               {}", summary.decisions);
    println!("Eligible:                    {}", summary.eligible);
    println!("Total candidates in store:   {}", summary.totals.candidates);
    println!("Total applications in store: {}", summary.totals.applications);
    println!("{rule}");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli
        .command
        .unwrap_or_else(|| Commands::Backfill(BackfillArgs::default()))
    {
        Commands::Backfill(args) => {
            let config = args.apply(BackfillConfig::from_env());
            info!(
                database_url = %config.database_url,
                sample_size = config.sample_size,
                dry_run = config.dry_run,
                "starting backfill"
            );
            let summary = BackfillPipeline::new(config)
                .run_once()
                .await
                .context("backfill run failed")?;
            print_summary(&summary);
        }
        Commands::Stats { database_url } => {
            let url = database_url.unwrap_or_else(|| BackfillConfig::from_env().database_url);
            let totals = rtrack_sync::store_totals(&url).await?;
            println!(
                "store {url}: candidates={} job_roles={} applications={} tests={} decisions={}",
                totals.candidates,
                totals.job_roles,
                totals.applications,
                totals.tests,
                totals.decisions
            );
        }
    }

    Ok(())
}
