//! Audio level monitor for KISS modems.
//!
//! Opens the modem, enables its diagnostics and prints every audio peak
//! reading until Enter is pressed.
//!
//! Usage:
//!   audiolevel [OPTIONS] [PORT]
//!
//! Options:
//!   --baud RATE       Baud rate (default: 115200)
//!   --config FILE     Load session settings from a JSON file
//!   --list-ports      List available serial ports and exit

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use kissmodem_core::protocol::{
    list_ports, ModemError, ModemSession, SessionConfig, SessionObserver,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Radio settings used by the monitor unless a config file overrides them
const MONITOR_PREAMBLE_MS: i64 = 150;
const MONITOR_TX_TAIL_MS: i64 = 10;
const MONITOR_PERSISTENCE: i64 = 255;
const MONITOR_SLOT_TIME_MS: i64 = 20;

#[derive(Debug, Parser)]
#[command(name = "audiolevel", about = "OpenModem Audio Level Monitor", version)]
struct Cli {
    /// Serial port where the modem is attached (or tcp://host:port)
    port: Option<String>,

    /// Baud rate
    #[arg(long, short, default_value_t = kissmodem_core::protocol::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// JSON session configuration file
    #[arg(long, short, env = "KISSMODEM_CONFIG")]
    config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn session_config(&self) -> anyhow::Result<Option<SessionConfig>> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => match &self.port {
                Some(port) => SessionConfig::new(port.as_str())
                    .with_baud_rate(self.baud)
                    .with_preamble_ms(MONITOR_PREAMBLE_MS)
                    .with_tx_tail_ms(MONITOR_TX_TAIL_MS)
                    .with_persistence(MONITOR_PERSISTENCE)
                    .with_slot_time_ms(MONITOR_SLOT_TIME_MS)
                    .with_flow_control(false),
                None => return Ok(None),
            },
        };

        if let Some(port) = &self.port {
            config.port_name = port.clone();
        }
        config.name = "OpenModem Interface".to_string();
        Ok(Some(config))
    }
}

/// Prints peak readings with a local timestamp
struct PeakPrinter;

impl PeakPrinter {
    fn print(msg: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        println!("[{}] {}", timestamp, msg);
    }
}

impl SessionObserver for PeakPrinter {
    fn on_data_frame(&self, payload: &[u8]) {
        Self::print(&format!("Decoded packet ({} bytes)", payload.len()));
    }

    fn on_peak_value(&self, peak: i8) {
        Self::print(&format!("Peak is: {}", peak));
    }

    fn on_offline(&self, error: &ModemError) {
        Self::print(&format!("Interface offline: {}", error));
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_ports {
        for port in list_ports() {
            match port.product {
                Some(product) => println!("{}\t{}", port.name, product),
                None => println!("{}", port.name),
            }
        }
        return Ok(());
    }

    let Some(config) = cli.session_config()? else {
        println!();
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let port = config.port_name.clone();
    let mut session = ModemSession::open(config, Arc::new(PeakPrinter))
        .with_context(|| format!("opening modem on {}", port))?;
    session.enable_diagnostics()?;
    info!("Monitoring audio level on {}, press Enter to stop", port);

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    if session.is_online() {
        if let Err(e) = session.disable_diagnostics() {
            error!("Could not disable diagnostics: {}", e);
        }
    }
    session.close();
    Ok(())
}
