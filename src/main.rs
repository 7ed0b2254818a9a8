//! Binary entrypoint for the statbits CLI.
//!
//! Commands:
//! - `init` - write a starter `statbits.toml`
//! - `encode <json> <out>` - build a binary schema blob from a JSON tree
//! - `inspect <schema> [--stats <json>] [--json]` - list achievements offline
//! - `plan <schema> <indices> [--stats <json>] [--lock]` - show the writes a mutation would send
//! - `simulate <schema> <indices> [--stats <json>] [--lock]` - run fetch/plan/write against an in-process peer
//!
//! See the library crate docs for module-level details: `statbits::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use statbits::config::Config;
use statbits::model::RawStat;
use statbits::planner::{parse_index_list, plan_mutation};
use statbits::report::render_report;
use statbits::schema::{apply_display_names, encode, parse_achievements, Node};
use statbits::service::ReportRow;

#[derive(Parser)]
#[command(name = "statbits")]
#[command(about = "Inspect achievement state and plan stat writes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "statbits.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Encode a JSON tree into a binary schema blob
    Encode {
        /// JSON object describing the schema root's children
        input: String,
        /// Output blob path
        output: String,
        /// Name of the root node
        #[arg(long, default_value = "schema")]
        root: String,
    },
    /// Parse a schema blob and list its achievements
    Inspect {
        /// Binary schema blob
        schema: String,
        /// JSON array of {"stat_id", "value"} current values
        #[arg(short, long)]
        stats: Option<String>,
        /// Resource label used in the report header
        #[arg(short, long, default_value = "0")]
        resource: String,
        /// Emit JSON rows instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the stat writes a mutation would submit
    Plan {
        schema: String,
        /// Achievement numbers, comma separated, or "*" for all
        indices: String,
        #[arg(short, long)]
        stats: Option<String>,
        /// Lock instead of unlock
        #[arg(long)]
        lock: bool,
    },
    /// Run report and mutation against a simulated peer
    Simulate {
        schema: String,
        indices: String,
        #[arg(short, long)]
        stats: Option<String>,
        #[arg(short, long, default_value_t = 440)]
        resource: u64,
        #[arg(long)]
        lock: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => None,
        _ => match Config::load(&cli.config).await {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("{} (using defaults)", e);
                None
            }
        },
    };
    init_logging(&config, cli.verbose);
    let config = config.unwrap_or_default();

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                warn!("{} already exists; leaving it untouched", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            println!("Created default configuration at {}", cli.config);
        }
        Commands::Encode {
            input,
            output,
            root,
        } => {
            let text = tokio::fs::read_to_string(&input)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", input, e))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| anyhow!("Failed to parse {}: {}", input, e))?;
            let blob = encode(&Node::from_json(root, &json));
            tokio::fs::write(&output, &blob)
                .await
                .map_err(|e| anyhow!("Failed to write {}: {}", output, e))?;
            info!("Wrote {} bytes to {}", blob.len(), output);
        }
        Commands::Inspect {
            schema,
            stats,
            resource,
            json,
        } => {
            let blob = read_blob(&schema).await?;
            let stats = read_stats(stats.as_deref()).await?;
            let mut definitions = parse_achievements(&blob, &stats)?;
            apply_display_names(&mut definitions, &config.locale.language);
            let rows: Vec<ReportRow> = definitions
                .iter()
                .enumerate()
                .map(|(pos, def)| ReportRow::from_definition(pos, def))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", render_report(&resource, &rows));
            }
        }
        Commands::Plan {
            schema,
            indices,
            stats,
            lock,
        } => {
            let selection = parse_index_list(&indices)?;
            let blob = read_blob(&schema).await?;
            let stats = read_stats(stats.as_deref()).await?;
            let definitions = parse_achievements(&blob, &stats)?;
            let plan = plan_mutation(&definitions, selection.as_slice(), !lock);
            for diagnostic in &plan.diagnostics {
                println!("{}", diagnostic);
            }
            if plan.has_writes() {
                println!("{}", serde_json::to_string_pretty(&plan.writes)?);
            } else {
                println!("Nothing to write");
            }
        }
        Commands::Simulate {
            schema,
            indices,
            stats,
            resource,
            lock,
        } => {
            #[cfg(not(feature = "sim"))]
            {
                let _ = (schema, indices, stats, resource, lock);
                log::error!("simulate requires the 'sim' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "sim")]
            {
                use statbits::exchange::PeerId;
                use statbits::report::{render_mutation, unavailable};
                use statbits::sim::SimulatedPeer;

                let selection = parse_index_list(&indices)?;
                let blob = read_blob(&schema).await?;
                let stats = read_stats(stats.as_deref()).await?;
                let (session, _handle) = SimulatedPeer::new()
                    .with_resource(resource, blob, &stats)
                    .attach(PeerId::from("sim"), &config);

                let label = resource.to_string();
                match session.get_report(resource).await {
                    Ok(rows) => println!("{}\n", render_report(&label, &rows)),
                    Err(e) => {
                        warn!("report failed: {}", e);
                        println!("{}", unavailable(&label));
                    }
                }
                match session
                    .apply_mutation(resource, selection.as_slice(), !lock)
                    .await
                {
                    Ok(report) => println!("{}\n", render_mutation(&report)),
                    Err(e) => println!("{}\nFailed!\n", e),
                }
                if let Ok(rows) = session.get_report(resource).await {
                    println!("{}", render_report(&label, &rows));
                }
                info!("exchange metrics: {:?}", session.coordinator().metrics());
            }
        }
    }

    Ok(())
}

async fn read_blob(path: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| anyhow!("Failed to read schema {}: {}", path, e))
}

async fn read_stats(path: Option<&str>) -> Result<Vec<RawStat>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read stats {}: {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| anyhow!("Failed to parse stats {}: {}", path, e))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Echo to the console only when someone is watching
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
