use arpguard_capture::{default_interface, get_interface, list_interfaces};
use arpguard_cli::{run, AlertLog, Cli, Commands, SharedSink, Source};
use arpguard_detect::Severity;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();
}

fn print_interfaces() -> Result<(), Box<dyn std::error::Error>> {
    println!("Available interfaces:");
    for iface in list_interfaces()? {
        let marker = if iface.is_capture_capable() { "*" } else { " " };
        println!(" {} {}", marker, iface);
    }
    println!();
    println!("* usable for capture");
    Ok(())
}

fn resolve_source(cli: &Cli) -> Result<Source, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.read {
        return Ok(Source::Savefile(path.clone()));
    }

    let iface = match &cli.interface {
        Some(name) => get_interface(name)?,
        None => default_interface()?,
    };
    Ok(Source::Live(iface.name))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    if let Some(Commands::Interfaces) = cli.command {
        return print_interfaces();
    }

    let detector = cli.detector_config()?;
    let pipeline = cli.pipeline_config()?;
    let source = resolve_source(&cli)?;

    info!(?detector, workers = pipeline.workers, "starting");

    let log = SharedSink::new(AlertLog::open(&cli.log_file, !cli.no_color)?);
    log.with(|log| {
        log.record(
            Severity::Info,
            &format!("ARP spoofing detector started on {}", source),
        )
    });

    let summary = run(source, detector, pipeline, log.clone()).await?;

    log.with(|log| log.record(Severity::Info, "ARP spoofing detector stopped"));
    eprintln!("\n{}", summary);

    Ok(())
}
