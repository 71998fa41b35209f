//! Capture to detection pipeline
//!
//! The capture side hands frames to a [`Dispatcher`], which routes each one
//! to a bounded per-worker channel by sender address. Every frame for one
//! address lands on the same worker, so claims for an address are judged in
//! arrival order. A single worker owns a plain [`BindingTable`]; with more
//! workers they share a [`SharedBindingTable`] so the capacity bound and the
//! shutdown snapshot cover every address.

use arpguard_capture::{
    replay_savefile, CaptureConfig, CaptureStats, PacketCapture, StatsAccumulator,
};
use arpguard_core::{Error, Packet, Result};
use arpguard_detect::{
    Binding, BindingStore, BindingTable, DetectionEngine, DetectorConfig, DetectorStats, EventSink,
    SharedBindingTable,
};
use arpguard_packet::arp_payload;
use chrono::{DateTime, Local};
use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::sync::mpsc::{
    self,
    error::{SendError, TrySendError},
    Receiver, Sender,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Pipeline sizing
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Detection workers draining the channel
    pub workers: usize,
    /// Frames buffered between capture and detection
    pub queue_depth: usize,
    pub capture: CaptureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_depth: 1024,
            capture: CaptureConfig::default(),
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone)]
pub enum Source {
    Live(String),
    Savefile(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Live(interface) => write!(f, "interface {}", interface),
            Source::Savefile(path) => write!(f, "savefile {}", path.display()),
        }
    }
}

/// Totals reported at shutdown
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub capture: CaptureStats,
    pub detector: DetectorStats,
    /// Final binding table, sorted by address
    pub bindings: Vec<(Ipv4Addr, Binding)>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.capture)?;
        writeln!(f, "{}", self.detector)?;
        write!(f, "Bindings tracked: {}", self.bindings.len())?;
        for (address, binding) in &self.bindings {
            write!(f, "\n  {:<15} {}", address, binding.hardware)?;
        }
        Ok(())
    }
}

/// Resolves once every worker has drained its channel
pub type WorkerSet =
    Pin<Box<dyn Future<Output = Result<(DetectorStats, Vec<(Ipv4Addr, Binding)>)>> + Send>>;

/// Offset of the sender protocol address inside an ARP payload
const SENDER_IP_OFFSET: usize = 14;

/// Routes frames to worker channels, one lane per worker
#[derive(Debug, Clone)]
pub struct Dispatcher {
    lanes: Vec<Sender<Packet>>,
}

impl Dispatcher {
    /// Worker lane for `packet`. Frames without a readable sender address
    /// go to lane 0; the worker drops or counts them there.
    pub fn lane(&self, packet: &Packet) -> usize {
        if self.lanes.len() <= 1 {
            return 0;
        }

        arp_payload(&packet.data)
            .and_then(|payload| payload.get(SENDER_IP_OFFSET..SENDER_IP_OFFSET + 4))
            .map_or(0, |spa| {
                let address = u32::from_be_bytes([spa[0], spa[1], spa[2], spa[3]]);
                address as usize % self.lanes.len()
            })
    }

    /// Queue without waiting; a full lane hands the frame back
    pub fn try_dispatch(&self, packet: Packet) -> std::result::Result<(), TrySendError<Packet>> {
        self.lanes[self.lane(&packet)].try_send(packet)
    }

    /// Queue from a blocking thread, waiting for room
    pub fn blocking_dispatch(&self, packet: Packet) -> std::result::Result<(), SendError<Packet>> {
        self.lanes[self.lane(&packet)].blocking_send(packet)
    }

    /// Queue from async code, waiting for room
    pub async fn dispatch(&self, packet: Packet) -> std::result::Result<(), SendError<Packet>> {
        self.lanes[self.lane(&packet)].send(packet).await
    }
}

/// Run the detector over `source` until the source ends or Ctrl-C
pub async fn run<K>(
    source: Source,
    detector: DetectorConfig,
    pipeline: PipelineConfig,
    sink: K,
) -> Result<RunSummary>
where
    K: EventSink + Clone + Send + 'static,
{
    let (dispatcher, workers) =
        start_workers(&detector, pipeline.workers, pipeline.queue_depth, sink);

    match source {
        Source::Live(interface) => {
            run_live(&interface, pipeline.capture, dispatcher, workers).await
        }
        Source::Savefile(path) => run_savefile(path, pipeline.capture, dispatcher, workers).await,
    }
}

async fn run_live(
    interface: &str,
    config: CaptureConfig,
    dispatcher: Dispatcher,
    mut workers: WorkerSet,
) -> Result<RunSummary> {
    let mut capture = PacketCapture::with_config(interface, config)?;
    let stats = capture.stats_handle();
    let drops = capture.stats_handle();

    capture.start(move |packet| match dispatcher.try_dispatch(packet) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => drops.record_queue_drop(),
        Err(TrySendError::Closed(_)) => trace!("detector gone, frame discarded"),
    })?;

    let result = tokio::select! {
        result = &mut workers => {
            warn!("Capture ended unexpectedly");
            result
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("Interrupt received, stopping capture");
            stop_capture(capture).await?;
            workers.await
        }
    };

    let (detector, bindings) = result?;
    Ok(RunSummary {
        capture: stats.snapshot(),
        detector,
        bindings,
    })
}

async fn stop_capture(mut capture: PacketCapture) -> Result<()> {
    // Joining the capture thread can take up to one read timeout
    tokio::task::spawn_blocking(move || capture.stop())
        .await
        .map_err(|e| Error::Worker(format!("capture shutdown failed: {}", e)))?
}

async fn run_savefile(
    path: PathBuf,
    config: CaptureConfig,
    dispatcher: Dispatcher,
    workers: WorkerSet,
) -> Result<RunSummary> {
    let stats = StatsAccumulator::new();
    let counter = stats.clone();

    // Replay is lossless: the reader waits for room in the channel
    let replay = tokio::task::spawn_blocking(move || {
        replay_savefile(&path, &config.filter, |packet| {
            counter.record_packet(packet.data.len());
            if dispatcher.blocking_dispatch(packet).is_err() {
                trace!("detector gone, frame discarded");
            }
        })
    });

    let replayed = replay
        .await
        .map_err(|e| Error::Worker(format!("savefile replay failed: {}", e)));
    let (detector, bindings) = workers.await?;
    let frames = replayed??;
    debug!(frames, "savefile drained");

    Ok(RunSummary {
        capture: stats.snapshot(),
        detector,
        bindings,
    })
}

/// Spawn `workers` detection workers for `config`, each behind a channel of
/// `queue_depth` frames
pub fn start_workers<K>(
    config: &DetectorConfig,
    workers: usize,
    queue_depth: usize,
    sink: K,
) -> (Dispatcher, WorkerSet)
where
    K: EventSink + Clone + Send + 'static,
{
    let (lanes, receivers): (Vec<_>, Vec<_>) =
        (0..workers.max(1)).map(|_| mpsc::channel(queue_depth)).unzip();
    let dispatcher = Dispatcher { lanes };

    let set: WorkerSet = if receivers.len() == 1 {
        let stores = vec![BindingTable::new(config.capacity)];
        Box::pin(join_workers(spawn_workers(stores, config, receivers, sink)))
    } else {
        let table = SharedBindingTable::new(config.capacity);
        let stores = vec![table; receivers.len()];
        Box::pin(join_workers(spawn_workers(stores, config, receivers, sink)))
    };

    (dispatcher, set)
}

fn spawn_workers<S, K>(
    stores: Vec<S>,
    config: &DetectorConfig,
    receivers: Vec<Receiver<Packet>>,
    sink: K,
) -> Vec<JoinHandle<DetectionEngine<S>>>
where
    S: BindingStore + Send + 'static,
    K: EventSink + Clone + Send + 'static,
{
    stores
        .into_iter()
        .zip(receivers)
        .enumerate()
        .map(|(id, (store, rx))| {
            let engine = DetectionEngine::with_store(store, config.clone());
            tokio::spawn(detect(id, engine, rx, sink.clone()))
        })
        .collect()
}

async fn join_workers<S: BindingStore>(
    handles: Vec<JoinHandle<DetectionEngine<S>>>,
) -> Result<(DetectorStats, Vec<(Ipv4Addr, Binding)>)> {
    let mut stats = DetectorStats::default();
    let mut bindings = Vec::new();

    for handle in handles {
        let engine = handle
            .await
            .map_err(|e| Error::Worker(format!("detection worker failed: {}", e)))?;
        stats.merge(engine.stats());
        // Every worker of a shared store sees the same table
        if engine.store().len() > bindings.len() {
            bindings = engine.store().snapshot();
        }
    }

    Ok((stats, bindings))
}

async fn detect<S, K>(
    id: usize,
    mut engine: DetectionEngine<S>,
    mut rx: Receiver<Packet>,
    mut sink: K,
) -> DetectionEngine<S>
where
    S: BindingStore,
    K: EventSink,
{
    debug!(worker = id, "detection worker started");

    while let Some(packet) = rx.recv().await {
        process_frame(&mut engine, &packet, &mut sink);
    }

    debug!(worker = id, "detection worker finished");
    engine
}

/// Locate the ARP payload in one captured frame and run it through `engine`
pub fn process_frame<S, K>(engine: &mut DetectionEngine<S>, packet: &Packet, sink: &mut K)
where
    S: BindingStore,
    K: EventSink,
{
    let Some(payload) = arp_payload(&packet.data) else {
        trace!(len = packet.len, "not an ARP frame");
        return;
    };

    if let Err(e) = engine.handle(payload, sink) {
        let captured = DateTime::<Local>::from(packet.timestamp);
        let captured = captured.format("%H:%M:%S%.6f");
        if e.is_recoverable() {
            debug!(
                source = %packet.interface,
                %captured,
                truncated = packet.is_truncated(),
                error = %e,
                "dropping ARP message"
            );
        } else {
            warn!(
                source = %packet.interface,
                %captured,
                error = %e,
                "failed to process ARP message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SharedSink;
    use arpguard_core::MacAddr;
    use arpguard_detect::{ArpMessage, CollectingSink, DetectionEvent};
    use arpguard_packet::{EtherType, EthernetFrame};
    use std::net::Ipv4Addr;

    const GATEWAY_MAC: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const ATTACKER_MAC: MacAddr = MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);

    fn frame(message: &ArpMessage) -> Packet {
        let bytes = EthernetFrame::new(
            MacAddr::broadcast(),
            message.sender_mac,
            EtherType::Arp,
            message.encode(),
        )
        .to_bytes();
        Packet::new("test0".to_string(), bytes)
    }

    fn gateway() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 1)
    }

    fn poisoning_sequence() -> Vec<Packet> {
        vec![
            frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway())),
            frame(&ArpMessage::request(
                MacAddr::new([0x02; 6]),
                Ipv4Addr::new(192, 168, 1, 20),
                gateway(),
            )),
            frame(&ArpMessage::reply(
                ATTACKER_MAC,
                gateway(),
                MacAddr::new([0x02; 6]),
                Ipv4Addr::new(192, 168, 1, 20),
            )),
        ]
    }

    async fn drive(
        workers: usize,
        packets: Vec<Packet>,
    ) -> (DetectorStats, Vec<(Ipv4Addr, Binding)>, CollectingSink) {
        let sink = SharedSink::new(CollectingSink::new());
        let (dispatcher, set) = start_workers(&DetectorConfig::default(), workers, 4, sink.clone());

        for packet in packets {
            dispatcher.dispatch(packet).await.unwrap();
        }
        drop(dispatcher);

        let (stats, bindings) = set.await.unwrap();
        let events = sink.with(|s| s.clone());
        (stats, bindings, events)
    }

    #[tokio::test]
    async fn test_single_worker_detects_poisoning() {
        let (stats, bindings, sink) = drive(1, poisoning_sequence()).await;

        assert_eq!(stats.messages, 3);
        assert_eq!(stats.spoofs_detected, 1);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].0, gateway());
        assert_eq!(bindings[0].1.hardware, GATEWAY_MAC);
        assert_eq!(
            sink.alerts().cloned().collect::<Vec<_>>(),
            vec![DetectionEvent::SpoofDetected {
                address: gateway(),
                previous: GATEWAY_MAC,
                observed: ATTACKER_MAC,
            }]
        );
    }

    #[tokio::test]
    async fn test_workers_share_bindings() {
        let mut packets = Vec::new();
        for _ in 0..20 {
            packets.push(frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway())));
        }
        packets.push(frame(&ArpMessage::gratuitous(ATTACKER_MAC, gateway())));

        let (stats, bindings, sink) = drive(4, packets).await;

        assert_eq!(stats.messages, 21);
        assert_eq!(stats.hosts_discovered, 1);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].1.hardware, GATEWAY_MAC);
        assert_eq!(sink.alerts().count(), 1);
    }

    #[tokio::test]
    async fn test_non_arp_and_truncated_frames_skipped() {
        let ipv4 = Packet::new(
            "test0".to_string(),
            EthernetFrame::new(
                MacAddr::broadcast(),
                GATEWAY_MAC,
                EtherType::IPv4,
                vec![0x45; 20],
            )
            .to_bytes(),
        );
        let mut truncated = frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway()));
        truncated.data.truncate(14 + 20);

        let good = frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway()));

        let (stats, bindings, sink) = drive(1, vec![ipv4, truncated, good]).await;

        // the IPv4 frame never reaches the engine
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(bindings.len(), 1);
        assert_eq!(sink.events.len(), 1);
    }

    #[tokio::test]
    async fn test_claims_for_one_address_keep_arrival_order() {
        let mut packets = Vec::new();
        for host in 1..=64u8 {
            let address = Ipv4Addr::new(10, 0, 0, host);
            packets.push(frame(&ArpMessage::gratuitous(GATEWAY_MAC, address)));
            packets.push(frame(&ArpMessage::reply(
                ATTACKER_MAC,
                address,
                MacAddr::new([0x02; 6]),
                Ipv4Addr::new(10, 0, 1, 1),
            )));
        }

        let (stats, bindings, sink) = drive(4, packets).await;

        assert_eq!(stats.hosts_discovered, 64);
        assert_eq!(sink.alerts().count(), 64);
        for alert in sink.alerts() {
            assert!(matches!(
                alert,
                DetectionEvent::SpoofDetected { previous, observed, .. }
                    if *previous == GATEWAY_MAC && *observed == ATTACKER_MAC
            ));
        }
        assert!(bindings.iter().all(|(_, b)| b.hardware == GATEWAY_MAC));
    }

    #[tokio::test]
    async fn test_dispatcher_lanes() {
        let (dispatcher, set) =
            start_workers(&DetectorConfig::default(), 4, 8, SharedSink::new(CollectingSink::new()));

        let first = frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway()));
        let again = frame(&ArpMessage::reply(ATTACKER_MAC, gateway(), GATEWAY_MAC, gateway()));
        assert_eq!(dispatcher.lane(&first), dispatcher.lane(&again));
        // 192.168.1.1 as a u32 is odd
        assert_eq!(dispatcher.lane(&first), 1);

        let runt = Packet::new("test0".to_string(), vec![0u8; 10]);
        assert_eq!(dispatcher.lane(&runt), 0);

        drop(dispatcher);
        set.await.unwrap();
    }

    #[tokio::test]
    async fn test_snaplen_truncated_frame_dropped() {
        let mut packet = frame(&ArpMessage::gratuitous(GATEWAY_MAC, gateway()));
        packet.len = packet.data.len();
        packet.data.truncate(14 + 16);
        assert!(packet.is_truncated());

        let (stats, bindings, sink) = drive(1, vec![packet]).await;

        assert_eq!(stats.malformed, 1);
        assert!(bindings.is_empty());
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            capture: CaptureStats::default(),
            detector: DetectorStats::default(),
            bindings: vec![(
                Ipv4Addr::new(10, 0, 0, 5),
                Binding::new(MacAddr::new([0xaa; 6])),
            )],
        };
        let text = summary.to_string();
        assert!(text.contains("Bindings tracked: 1"));
        assert!(text.ends_with("aa:aa:aa:aa:aa:aa"));
    }
}
