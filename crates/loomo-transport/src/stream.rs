//! 传感器流管理
//!
//! 启动一个流时创建：
//!
//! ```text
//! UDP socket ──> 接收线程 ──(timestamp % N)──> 重组 worker × N ──> handler 线程
//! ```
//!
//! - 接收线程带读超时，每次超时检查停止标志
//! - 同一帧的分片总是路由到同一个 worker
//! - 停止后接收线程退出并关闭 socket，数据报通道随之关闭，
//!   worker 依次退出，最后 handler 的帧通道关闭

use crate::{SensorFrame, StreamMetrics, StreamMetricsSnapshot, TransportConfig, TransportError};
use crate::reassembly::Reassembler;
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, bounded};
use loomo_protocol::{MAX_PACKET_SIZE, PacketHeader, StreamTag};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// 把重组后的帧转换为应用对象
///
/// `handle_stream` 在独立线程中运行，帧通道关闭时应返回。
pub trait StreamHandler: Send + Sync {
    fn handle_stream(&self, frames: Receiver<SensorFrame>);
}

impl<F> StreamHandler for F
where
    F: Fn(Receiver<SensorFrame>) + Send + Sync,
{
    fn handle_stream(&self, frames: Receiver<SensorFrame>) {
        self(frames)
    }
}

struct RunningStream {
    tag: StreamTag,
    is_running: Arc<AtomicBool>,
    metrics: Arc<StreamMetrics>,
    receiver: Option<JoinHandle<()>>,
}

impl RunningStream {
    fn stop(&mut self) {
        // Release: 接收线程看到 false 时也能看到之前的所有写入
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.receiver.take()
            && handle.join().is_err()
        {
            error!("Receive thread for stream {} panicked", self.tag);
        }
    }
}

/// handler 注册表 + 正在运行的流（按本地端口索引）
pub struct StreamRegistry {
    config: TransportConfig,
    handlers: RwLock<HashMap<String, Arc<dyn StreamHandler>>>,
    streams: Mutex<HashMap<u16, RunningStream>>,
}

impl StreamRegistry {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// 注册 handler，`handler_tag` 为 `S` + 流标签（如 `SCAM`）
    ///
    /// 同名 handler 会被替换。
    pub fn register(&self, handler_tag: impl Into<String>, handler: Arc<dyn StreamHandler>) {
        let handler_tag = handler_tag.into();
        debug!("Registering stream handler {}", handler_tag);
        self.handlers.write().insert(handler_tag, handler);
    }

    pub fn has_handler(&self, handler_tag: &str) -> bool {
        self.handlers.read().contains_key(handler_tag)
    }

    /// 在 `port` 上启动流
    ///
    /// socket 同步绑定，返回实际本地地址（`port` 为 0 时由系统分配）。
    pub fn start(&self, port: u16, stream: StreamTag) -> Result<SocketAddr, TransportError> {
        let handler_tag = stream.handler_tag();
        let handler = self
            .handlers
            .read()
            .get(&handler_tag)
            .cloned()
            .ok_or_else(|| TransportError::UnknownStream(handler_tag.clone()))?;

        let mut streams = self.streams.lock();
        if port != 0 && streams.contains_key(&port) {
            return Err(TransportError::StreamAlreadyRunning(port));
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_read_timeout(Some(self.config.receive_timeout()))?;
        let local_addr = socket.local_addr()?;
        let local_port = local_addr.port();

        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(StreamMetrics::new());
        let (frame_tx, frame_rx) = bounded(self.config.frame_channel_capacity);

        let worker_count = self.config.reassembly_workers.max(1);
        let mut packet_txs = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (packet_tx, packet_rx) = bounded(self.config.packet_channel_capacity);
            packet_txs.push(packet_tx);
            let frame_tx = frame_tx.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name(format!("loomo-reassembly-{local_port}-{id}"))
                .spawn(move || reassembly_worker(id, packet_rx, frame_tx, metrics))?;
        }
        drop(frame_tx);

        thread::Builder::new()
            .name(format!("loomo-handler-{local_port}"))
            .spawn(move || handler.handle_stream(frame_rx))?;

        let receiver = {
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name(format!("loomo-receive-{local_port}"))
                .spawn(move || receive_loop(local_port, socket, packet_txs, is_running, metrics))?
        };

        info!("Started stream {} on port {}", stream, local_port);
        streams.insert(
            local_port,
            RunningStream {
                tag: stream,
                is_running,
                metrics,
                receiver: Some(receiver),
            },
        );
        Ok(local_addr)
    }

    /// 停止 `port` 上的流
    ///
    /// 等待接收线程退出（至多一个读超时），socket 随之关闭。
    /// worker 和 handler 在各自的通道关闭后自行退出。
    pub fn stop(&self, port: u16) -> Result<(), TransportError> {
        let mut stream = self
            .streams
            .lock()
            .remove(&port)
            .ok_or(TransportError::StreamNotRunning(port))?;
        stream.stop();
        info!("Stopped stream {} on port {}", stream.tag, port);
        Ok(())
    }

    /// 停止所有流
    pub fn shutdown(&self) {
        let streams: Vec<(u16, RunningStream)> = self.streams.lock().drain().collect();
        for (port, mut stream) in streams {
            stream.stop();
            debug!("Stopped stream {} on port {} during shutdown", stream.tag, port);
        }
    }

    pub fn is_running(&self, port: u16) -> bool {
        self.streams.lock().contains_key(&port)
    }

    pub fn running_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.streams.lock().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn metrics(&self, port: u16) -> Option<StreamMetricsSnapshot> {
        self.streams
            .lock()
            .get(&port)
            .map(|stream| stream.metrics.snapshot())
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(
    port: u16,
    socket: UdpSocket,
    workers: Vec<Sender<Bytes>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<StreamMetrics>,
) {
    debug!("Receive loop started on port {}", port);
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    loop {
        // Acquire: 看到 false 时也能看到 stop 之前的写入
        if !is_running.load(Ordering::Acquire) {
            trace!("Receive loop on port {}: stop flag set, exiting", port);
            break;
        }

        let n = match socket.recv_from(&mut buf) {
            Ok((n, _)) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                metrics.receive_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) => {
                error!("Reading UDP on port {} failed: {}", port, e);
                break;
            },
        };
        metrics.datagrams_received.fetch_add(1, Ordering::Relaxed);

        let datagram = Bytes::copy_from_slice(&buf[..n]);
        let header = match PacketHeader::decode(&datagram) {
            Ok(header) => header,
            Err(e) => {
                metrics.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping datagram on port {}: {}", port, e);
                continue;
            },
        };

        let worker = &workers[(header.timestamp % workers.len() as u64) as usize];
        if worker.send(datagram).is_err() {
            warn!("Reassembly worker for port {} is gone, stopping receive loop", port);
            break;
        }
    }

    debug!("Receive loop on port {} exited", port);
}

fn reassembly_worker(
    id: usize,
    packets: Receiver<Bytes>,
    frames: Sender<SensorFrame>,
    metrics: Arc<StreamMetrics>,
) {
    let mut reassembler = Reassembler::new();

    for datagram in packets.iter() {
        match reassembler.push(datagram) {
            Ok(Some(frame)) => {
                metrics.frames_completed.fetch_add(1, Ordering::Relaxed);
                if frames.send(frame).is_err() {
                    debug!("Reassembly worker {}: handler gone, exiting", id);
                    return;
                }
            },
            Ok(None) => {},
            Err(e) => {
                metrics.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
                debug!("Reassembly worker {}: dropping fragment: {}", id, e);
            },
        }
    }

    if reassembler.pending_frames() > 0 {
        debug!(
            "Reassembly worker {} exiting with {} incomplete frames",
            id,
            reassembler.pending_frames()
        );
    }
}
