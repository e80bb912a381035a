//! Native serial port implementation using the `serialport` crate.
//!
//! Panels are always driven at 8N1 without flow control.

use {
    crate::{
        error::{Error, Result},
        port::{Port, PortEnumerator, PortInfo, SerialConfig},
    },
    log::trace,
    serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits},
    std::{
        io::{ErrorKind, Read, Write},
        time::Duration,
    },
};

/// Native serial port implementation.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    timeout: Duration,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;

        Ok(Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
            timeout: config.timeout,
            baud_rate: config.baud_rate,
        })
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig::new(port_name, baud_rate);
        Self::open(&config)
    }

    /// Driver-level read timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn inner(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| {
                Error::Serial(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "Port is closed",
                ))
            })
    }
}

impl Port for NativePort {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        trace!("Setting {} to {baud_rate} baud", self.name);
        self.inner()?
            .set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let pending = self
            .inner()?
            .bytes_to_read()?;
        Ok(pending as usize)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self
            .inner()?
            .read(&mut buf)
        {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let port = self.inner()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.inner()?
            .clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.port
            .is_some()
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the device
        self.port
            .take();
        Ok(())
    }
}

/// Native port enumerator.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(Error::Serial)?;

        Ok(ports
            .into_iter()
            .map(|p| {
                let (vid, pid, manufacturer, product, serial_number) = match &p.port_type {
                    serialport::SerialPortType::UsbPort(info) => (
                        Some(info.vid),
                        Some(info.pid),
                        info.manufacturer
                            .clone(),
                        info.product
                            .clone(),
                        info.serial_number
                            .clone(),
                    ),
                    _ => (None, None, None, None, None),
                };

                PortInfo {
                    name: p.port_name,
                    vid,
                    pid,
                    manufacturer,
                    product,
                    serial_number,
                }
            })
            .collect())
    }
}
