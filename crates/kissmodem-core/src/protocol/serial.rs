//! Serial port handling
//!
//! Opens the modem link described by a [`SessionConfig`].

use serialport::{DataBits, FlowControl, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::net::TcpStream;
use std::time::Duration;
use tracing::info;

use super::{ModemChannel, ModemError, Parity, SerialChannel, SessionConfig, TcpChannel};

/// Device paths with this prefix are opened as KISS-over-TCP links
pub const TCP_PREFIX: &str = "tcp://";

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let product = match info.port_type {
            SerialPortType::UsbPort(usb_info) => usb_info.product,
            _ => None,
        };

        Self {
            name: info.port_name,
            product,
        }
    }
}

/// Sort so that ttyACM* ports come first, then ttyUSB*, then the rest
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0, "ttyACM"), (1, "ttyUSB")] {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in a deterministic order
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

fn data_bits(bits: u8) -> Result<DataBits, ModemError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(ModemError::Config(format!("unsupported data bits: {}", other))),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits, ModemError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(ModemError::Config(format!("unsupported stop bits: {}", other))),
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Open a serial port with the line settings from `config`.
///
/// No hardware or software flow control is used on the line itself.
pub fn open_port(config: &SessionConfig) -> Result<Box<dyn SerialPort>, ModemError> {
    let open_error = |reason: String| ModemError::TransportOpen {
        path: config.port_name.clone(),
        reason,
    };

    serialport::new(&config.port_name, config.baud_rate)
        .data_bits(data_bits(config.data_bits)?)
        .parity(config.parity.into())
        .stop_bits(stop_bits(config.stop_bits)?)
        .flow_control(FlowControl::None)
        // Reads are only issued after bytes_to_read() reports data
        .timeout(Duration::from_millis(10))
        .open()
        .map_err(|e| open_error(e.to_string()))
}

/// Open the modem link: a serial port, or a TCP connection for `tcp://host:port`
pub fn open_channel(config: &SessionConfig) -> Result<Box<dyn ModemChannel>, ModemError> {
    if let Some(addr) = config.port_name.strip_prefix(TCP_PREFIX) {
        info!("Connecting to KISS server {}...", addr);
        let stream = TcpStream::connect(addr).map_err(|e| ModemError::TransportOpen {
            path: config.port_name.clone(),
            reason: e.to_string(),
        })?;
        stream.set_nodelay(true)?;
        return Ok(Box::new(TcpChannel::new(stream)));
    }

    info!("Opening serial port {}...", config.port_name);
    let port = open_port(config)?;
    Ok(Box::new(SerialChannel::new(port)))
}
