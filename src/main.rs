//! Rule document checker.
//!
//! Parses a dispatch rule document and prints the action chosen for every
//! priority, per declared status and connection state.
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use prio_dispatch::ConfigurationParser;
use prio_dispatch::DispatchConfig;
use prio_dispatch::Error;
use prio_dispatch::LogConfig;
use prio_dispatch::Priority;
use prio_dispatch::Result;
use prio_dispatch::StatusConfiguration;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Parser)]
#[command(name = "prio-dispatch")]
#[command(version)]
#[command(about = "Checks priority dispatch rule documents", long_about = None)]
struct Args {
    /// Rule document, defaults to the configured rules
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Status message content to resolve
    #[arg(short, long)]
    status: Option<String>,

    /// Settings file merged over `CONFIG_PATH` and the defaults
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DispatchConfig::new()?;
    if let Some(path) = &args.config {
        config = config.with_override_config(path)?;
    }
    let config = config.validate()?;

    let _guard = init_observability(&config.log)?;

    let document = match &args.rules {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| Error::Fatal(format!("Can't read {}: {}", path.display(), e)))?,
        None => config
            .plugin
            .load_rules()?
            .unwrap_or_else(|| prio_dispatch::constants::DEFAULT_RULE_DOCUMENT.to_string()),
    };

    let parser = match ConfigurationParser::parse(&document) {
        Ok(parser) => parser,
        Err(e) => {
            error!("Rule document rejected: {}", e);
            eprintln!("invalid rule document: {e}");
            return Err(e.into());
        }
    };
    info!("Rule document accepted");

    println!("default action: {}", parser.default_action());
    println!(
        "default status: {}",
        parser.default_status().unwrap_or("<none>")
    );
    for conf in parser.status_configurations() {
        print_table(&describe(conf), conf);
    }

    let (resolved, found) = parser.resolve(args.status.as_deref());
    print_table(
        &format!("resolved status {:?} ({:?})", args.status, found),
        &resolved,
    );
    Ok(())
}

fn describe(conf: &StatusConfiguration) -> String {
    match (conf.oid(), conf.content(), conf.connection_state()) {
        (Some(oid), Some(content), Some(state)) => format!("{oid}={content}, connection {state}"),
        (Some(oid), Some(content), None) => format!("{oid}={content}"),
        (_, _, Some(state)) => format!("connection {state}"),
        _ => "default".to_string(),
    }
}

fn print_table(
    title: &str,
    conf: &Arc<StatusConfiguration>,
) {
    println!("{title}:");
    for priority in Priority::all() {
        println!("  {:>2} -> {}", priority, conf.resolve(priority));
    }
}

fn init_observability(log: &LogConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let (writer, guard) = match &log.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Fatal(format!("Can't create log dir {}: {}", dir.display(), e)))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "dispatch.log"))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_filter(filter);
    tracing_subscriber::registry().with(layer).init();

    Ok(guard)
}
