use log::info;
use ros_status_lib::logger::StderrLogger;
use ros_status_lib::{ReporterConfig, StatusReporter};

#[tokio::main]
async fn main() {
    StderrLogger::init(StderrLogger::level_from_env());

    let config = ReporterConfig::from_env();
    info!("querying master at {}", config.master_uri);

    if let Err(err) = run(config).await {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

async fn run(config: ReporterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let options = config.sampling_options();
    let reporter = StatusReporter::connect(config)?;
    let report = reporter.full_report(options).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
