//! ARP capture on top of pcap
//!
//! Live captures run on their own thread and hand every frame to a callback.
//! Savefile replay runs on the caller's thread until the file is exhausted.

use arpguard_core::{Error, Packet, Result};
use parking_lot::{Mutex, RwLock};
use pcap::{Active, Capture, Device, Linktype, Offline, PacketHeader};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::filters;
use crate::interface::{get_interface, InterfaceInfo};
use crate::stats::{CaptureStats, StatsAccumulator};

/// Default snapshot length; ARP frames never come close
const DEFAULT_SNAPLEN: i32 = 256;

/// Default read timeout (milliseconds); bounds how long `stop` waits
const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Configuration for packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Kernel buffer size (0 = pcap default)
    pub buffer_size: i32,
    /// Deliver packets as soon as they arrive
    pub immediate_mode: bool,
    /// BPF filter applied to the capture
    pub filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
            filter: filters::arp_with_vlan_filter(),
        }
    }
}

/// State of packet capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Capture is not running
    Stopped,
    /// Capture is actively running
    Running,
}

/// Live ARP capture on one interface
pub struct PacketCapture {
    interface: String,
    interface_info: InterfaceInfo,
    config: CaptureConfig,
    state: Arc<RwLock<CaptureState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: StatsAccumulator,
}

impl PacketCapture {
    /// Create a capture on the named interface with the default config
    pub fn new(interface: &str) -> Result<Self> {
        Self::with_config(interface, CaptureConfig::default())
    }

    /// Create a capture with a custom configuration
    pub fn with_config(interface: &str, config: CaptureConfig) -> Result<Self> {
        let interface_info = get_interface(interface)?;

        if !interface_info.is_up {
            return Err(Error::capture(format!("Interface '{}' is not up", interface)));
        }

        info!("Created ARP capture on interface: {}", interface);

        Ok(Self {
            interface: interface.to_string(),
            interface_info,
            config,
            state: Arc::new(RwLock::new(CaptureState::Stopped)),
            worker: Mutex::new(None),
            stats: StatsAccumulator::new(),
        })
    }

    /// Get interface information
    pub fn interface_info(&self) -> &InterfaceInfo {
        &self.interface_info
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Get current capture state
    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Get current statistics
    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }

    /// Handle for recording drops from outside the capture thread
    pub fn stats_handle(&self) -> StatsAccumulator {
        self.stats.clone()
    }

    fn open(&self) -> Result<Capture<Active>> {
        debug!("Opening pcap capture on {}", self.interface);

        let device = Device::from(self.interface.as_str());
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::capture(format!("Failed to create capture: {}", e)))?
            .promisc(self.config.promiscuous)
            .snaplen(self.config.snaplen)
            .timeout(self.config.timeout_ms)
            .immediate_mode(self.config.immediate_mode);

        if self.config.buffer_size > 0 {
            capture = capture.buffer_size(self.config.buffer_size);
        }

        let mut capture = capture
            .open()
            .map_err(|e| Error::capture(format!("Failed to open {}: {}", self.interface, e)))?;

        require_ethernet(capture.get_datalink(), &self.interface)?;

        capture
            .filter(&self.config.filter, true)
            .map_err(|e| Error::capture(format!("Invalid BPF filter: {}", e)))?;

        info!(
            interface = %self.interface,
            filter = %self.config.filter,
            "Sniffing started"
        );
        Ok(capture)
    }

    /// Start capturing; `callback` runs on the capture thread for every frame
    pub fn start<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(Packet) + Send + 'static,
    {
        if self.is_running() {
            return Err(Error::capture("Capture already running"));
        }

        let mut capture = self.open()?;
        *self.state.write() = CaptureState::Running;

        let state = Arc::clone(&self.state);
        let stats = self.stats.clone();
        let interface = self.interface.clone();

        let handle = thread::spawn(move || {
            while *state.read() == CaptureState::Running {
                match capture.next_packet() {
                    Ok(packet) => {
                        stats.record_packet(packet.data.len());
                        callback(to_packet(&interface, packet.header, packet.data));
                    }
                    Err(pcap::Error::TimeoutExpired) => continue,
                    Err(e) => {
                        error!("Packet capture error: {}", e);
                        break;
                    }
                }
            }

            if let Ok(pcap_stats) = capture.stats() {
                stats.record_kernel_drops(pcap_stats.dropped as u64 + pcap_stats.if_dropped as u64);
            }

            *state.write() = CaptureState::Stopped;
            info!("Capture thread on {} finished", interface);
        });

        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop capturing and wait for the capture thread to exit.
    ///
    /// The thread notices within one read timeout. Dropping it also drops
    /// the callback, which is how downstream channels learn the capture
    /// ended.
    pub fn stop(&mut self) -> Result<()> {
        if self.is_running() {
            info!("Stopping packet capture on {}", self.interface);
            *self.state.write() = CaptureState::Stopped;
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("Capture thread on {} panicked", self.interface);
            }
        }

        Ok(())
    }
}

impl Drop for PacketCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Replay a pcap savefile, calling `callback` for every frame that passes
/// `filter`. Returns the number of frames delivered.
pub fn replay_savefile<P, F>(path: P, filter: &str, mut callback: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(Packet),
{
    let path = path.as_ref();
    let source = path.display().to_string();

    let mut capture: Capture<Offline> = Capture::from_file(path)
        .map_err(|e| Error::capture(format!("Failed to open savefile {}: {}", source, e)))?;

    require_ethernet(capture.get_datalink(), &source)?;

    capture
        .filter(filter, true)
        .map_err(|e| Error::capture(format!("Invalid BPF filter: {}", e)))?;

    info!(file = %source, filter = %filter, "Replaying savefile");

    let mut delivered = 0;
    loop {
        match capture.next_packet() {
            Ok(packet) => {
                callback(to_packet(&source, packet.header, packet.data));
                delivered += 1;
            }
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                return Err(Error::capture(format!(
                    "Failed reading {} after {} frames: {}",
                    source, delivered, e
                )))
            }
        }
    }

    info!(file = %source, frames = delivered, "Replay finished");
    Ok(delivered)
}

/// Only Ethernet framing is understood by the payload locator
fn require_ethernet(linktype: Linktype, source: &str) -> Result<()> {
    if linktype != Linktype::ETHERNET {
        return Err(Error::capture(format!(
            "{} doesn't provide Ethernet headers ({:?}) - not supported",
            source, linktype
        )));
    }
    Ok(())
}

fn to_packet(source: &str, header: &PacketHeader, data: &[u8]) -> Packet {
    Packet {
        timestamp: header_time(header),
        interface: source.to_string(),
        data: data.to_vec(),
        len: header.len as usize,
    }
}

fn header_time(header: &PacketHeader) -> SystemTime {
    let secs = header.ts.tv_sec.max(0) as u64;
    let micros = header.ts.tv_usec.clamp(0, 999_999) as u32;
    UNIX_EPOCH + Duration::new(secs, micros * 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> Result<PacketCapture> {
        PacketCapture::new("lo")
            .or_else(|_| PacketCapture::new("lo0"))
            .or_else(|_| PacketCapture::new("\\Device\\NPF_Loopback"))
    }

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
        assert_eq!(config.filter, "arp or (vlan and arp)");
    }

    #[test]
    fn test_unknown_interface() {
        assert!(matches!(
            PacketCapture::new("nonexistent_interface_xyz"),
            Err(Error::InterfaceNotFound(_))
        ));
    }

    #[test]
    fn test_new_capture_is_stopped() {
        match loopback() {
            Ok(capture) => {
                assert_eq!(capture.state(), CaptureState::Stopped);
                assert!(!capture.is_running());
                assert_eq!(capture.stats().packets_received, 0);
            }
            Err(e) => {
                // Loopback naming and privileges vary between hosts
                println!("Could not create capture: {}", e);
            }
        }
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        if let Ok(mut capture) = loopback() {
            assert!(capture.stop().is_ok());
            assert!(capture.stop().is_ok());
        }
    }

    #[test]
    fn test_replay_missing_file() {
        let result = replay_savefile(
            "/nonexistent/arpguard/trace.pcap",
            &filters::arp_filter(),
            |_| {},
        );
        assert!(matches!(result, Err(Error::Capture(_))));
    }

    #[test]
    fn test_require_ethernet() {
        assert!(require_ethernet(Linktype::ETHERNET, "eth0").is_ok());
        assert!(require_ethernet(Linktype(101), "tun0").is_err());
    }
}
