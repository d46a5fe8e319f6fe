use anyhow::Context;
use stampede::cli::{connector_for, exit_on_usage, Args};
use stampede::Benchmark;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stampede=info"));
    FmtSubscriber::builder().with_env_filter(filter).init();

    if let Err(err) = run(Args::parse_normalized()).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let invocation = args.validate().map_err(exit_on_usage)?;
    let connector =
        connector_for(&invocation.servers, &invocation.options).map_err(exit_on_usage)?;

    let report = Benchmark::new(connector, invocation.options, invocation.config)
        .run()
        .await?;
    print!("{report}");

    if let Some(path) = invocation.csv {
        std::fs::write(&path, report.csv())
            .with_context(|| format!("Unable to write {}", path.display()))?;
        println!("Saved metric data in csv file {}", path.display());
    }

    Ok(())
}
