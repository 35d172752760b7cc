//! Serial port transport implementation
//!
//! Provides the serial link to 3D printer controllers over USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Auto-reset handshake on open (DTR toggle with input flush)
//! - Newline-framed writes
//! - Line reads bounded by a timeout

use super::Transport;
use gcodestream_core::{Error, Result, TransportError};
use serialport::ClearBuffer;
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Default baud rate for printer controllers
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Minimum settle time around the reset input flush
pub const MIN_RESET_DELAY: Duration = Duration::from_millis(100);

/// Default serial device
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM1";
/// Default serial device
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Port read timeout; bounds how long a single poll blocks
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Device path (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Settle time before and after flushing input during reset
    pub reset_delay: Duration,
}

impl ConnectionParams {
    /// Create parameters for a port with default baud rate and reset delay
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            reset_delay: MIN_RESET_DELAY,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set reset delay, never below [`MIN_RESET_DELAY`]
    pub fn with_reset_delay(mut self, reset_delay: Duration) -> Self {
        self.reset_delay = reset_delay.max(MIN_RESET_DELAY);
        self
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

/// List serial ports that look like printer controllers
///
/// Filters ports to controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| {
            let (vid, pid) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => (Some(usb.vid), Some(usb.pid)),
                _ => (None, None),
            };
            SerialPortInfo {
                port_name: port.port_name.clone(),
                description: describe_port(port),
                vid,
                pid,
            }
        })
        .collect())
}

/// Check if a port name matches controller patterns
fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

/// Get a user-friendly description for a port
fn describe_port(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => format!(
            "USB {} {}",
            usb_info.manufacturer.as_deref().unwrap_or("Device"),
            usb_info.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Decode one raw response line.
///
/// Strips the terminator and surrounding whitespace. Invalid UTF-8 is a
/// recoverable error; the bytes are already consumed from the stream.
pub(crate) fn decode_line(raw: Vec<u8>) -> std::result::Result<String, TransportError> {
    let length = raw.len();
    String::from_utf8(raw)
        .map(|text| text.trim().to_string())
        .map_err(|e| TransportError::Undecodable {
            length,
            reason: e.to_string(),
        })
}

/// Bytes received but not yet returned as a line
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the first complete line, terminator included
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        Some(self.pending.drain(..=end).collect())
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Read from `reader` until `buffer` holds a full line or `timeout` passes.
///
/// The reader is expected to block for a short poll interval and report
/// `TimedOut` when nothing arrived. Partial lines stay in the buffer for
/// the next call.
pub(crate) fn read_framed<R: Read + ?Sized>(
    reader: &mut R,
    buffer: &mut LineBuffer,
    timeout: Duration,
) -> std::result::Result<String, TransportError> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 256];

    loop {
        if let Some(raw) = buffer.take_line() {
            return decode_line(raw);
        }
        if Instant::now() >= deadline {
            return Err(TransportError::timeout(timeout));
        }

        match reader.read(&mut chunk) {
            Ok(n) => buffer.extend(&chunk[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                return Err(TransportError::ReadFailed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Serial link to a controller
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
    pending: LineBuffer,
}

impl SerialTransport {
    /// Open the port and run the auto-reset handshake.
    ///
    /// Boards wired for auto-reset restart when DTR is toggled; the input
    /// buffer is flushed in between so boot noise is not read as a response.
    pub fn open(params: &ConnectionParams) -> std::result::Result<Self, TransportError> {
        let failed = |e: serialport::Error| {
            tracing::warn!("Failed to open serial port {}: {}", params.port, e);
            TransportError::FailedToOpen {
                port: params.port.clone(),
                reason: e.to_string(),
            }
        };

        let mut port = serialport::new(&params.port, params.baud_rate)
            .timeout(READ_POLL_INTERVAL)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(failed)?;

        tracing::debug!("Init printer on {} at {} baud", params.port, params.baud_rate);
        reset(port.as_mut(), params.reset_delay.max(MIN_RESET_DELAY)).map_err(failed)?;

        Ok(Self {
            port_name: params.port.clone(),
            port: Some(port),
            pending: LineBuffer::default(),
        })
    }

    fn port_mut(&mut self) -> std::result::Result<&mut dyn serialport::SerialPort, TransportError> {
        match self.port.as_mut() {
            Some(port) => Ok(port.as_mut()),
            None => Err(TransportError::Closed),
        }
    }
}

/// Toggle DTR around an input flush
fn reset(port: &mut dyn serialport::SerialPort, settle: Duration) -> serialport::Result<()> {
    port.write_data_terminal_ready(false)?;
    thread::sleep(settle);
    port.clear(ClearBuffer::Input)?;
    thread::sleep(settle);
    port.write_data_terminal_ready(true)?;
    Ok(())
}

impl Transport for SerialTransport {
    fn send_line(&mut self, line: &str) -> std::result::Result<(), TransportError> {
        let port = self.port_mut()?;
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');

        port.write_all(framed.as_bytes())
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::WriteFailed {
                reason: e.to_string(),
            })
    }

    fn read_line(&mut self, timeout: Duration) -> std::result::Result<String, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        read_framed(port.as_mut(), &mut self.pending, timeout)
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        if self.port.take().is_some() {
            tracing::debug!("Closed serial port {}", self.port_name);
        }
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> String {
        self.port_name.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
