use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use telegram_relay::{
    EventKind, EventPayload,
    config::JsonFileStore,
    relay::Relay,
    template::plain_text,
    util::{get_admin_name, get_config_path},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Feeds host events from stdin (one JSON object per line) through the relay
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file, defaults to $RELAY_CONFIG or ./config.json
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Log at TRACE instead of DEBUG
    #[arg(short, long)]
    verbose: bool,
}

/// One line of input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Event {
        event: String,
        #[serde(default)]
        payload: HashMap<String, Value>,
    },
    Tps {
        tps: Vec<f64>,
    },
    Command(Command),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    Reload {
        who: Option<String>,
    },
    List,
    Toggle {
        feature: String,
        state: String,
    },
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::DEBUG
    };
    let filter = filter::Targets::new().with_targets(vec![("telegram_relay", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let path = args.file.unwrap_or_else(get_config_path);
    let store = Arc::new(JsonFileStore::new(&path));

    // latest readings reported on stdin, sampled by the health monitor
    let readings = Arc::new(Mutex::new(Vec::<f64>::new()));
    let source = {
        let readings = readings.clone();
        Arc::new(move || {
            readings
                .lock()
                .map(|readings| readings.clone())
                .unwrap_or_default()
        })
    };

    let relay = Relay::start(store, source)
        .with_context(|| format!("failed to start relay with {}", path.display()))?;
    info!("reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&relay, &readings, &line),
                    Ok(None) => {
                        debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        error!("failed to read stdin: {e}");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }

    relay.shutdown().await
}

fn handle_line(relay: &Relay, readings: &Mutex<Vec<f64>>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let input = match serde_json::from_str::<Input>(line) {
        Ok(input) => input,
        Err(e) => {
            warn!("ignoring malformed line: {e}");
            return;
        }
    };

    match input {
        Input::Event { event, payload } => {
            let kind = match event.parse::<EventKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("{e}");
                    return;
                }
            };
            let dispatch = relay.notify(kind, to_payload(payload));
            trace!("{kind}: {dispatch:?}");
        }

        Input::Tps { tps } => {
            if let Ok(mut readings) = readings.lock() {
                *readings = tps;
            }
        }

        Input::Command(Command::Reload { who }) => {
            let who = who.unwrap_or_else(get_admin_name);
            match relay.reload(&who) {
                Ok(report) => println!("Reloaded in {}ms.", report.took.as_millis()),
                Err(e) => println!("Reload failed, previous settings kept: {e}"),
            }
        }

        Input::Command(Command::List) => {
            println!("Features:");
            for feature in relay.features() {
                println!(
                    " - {}: {}",
                    feature.name,
                    if feature.enabled { "on" } else { "off" }
                );
            }
        }

        Input::Command(Command::Toggle { feature, state }) => match relay.toggle(&feature, &state) {
            Ok((kind, enabled)) => println!("Set {} = {enabled}.", kind.flag_key()),
            Err(e) => println!("{e}"),
        },
    }
}

/// Strings pass through, chat components are flattened, anything else is printed as JSON.
fn to_payload(fields: HashMap<String, Value>) -> EventPayload {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => text,
                Value::Null => String::new(),
                component @ (Value::Object(_) | Value::Array(_)) => plain_text(Some(&component)),
                other => other.to_string(),
            };
            (name, value)
        })
        .collect()
}
