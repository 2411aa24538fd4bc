//! TCP 控制通道

use crate::{CommandSink, TransportConfig, TransportError, discover};
use loomo_protocol::Command;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use tracing::{debug, trace};

/// 发现机器人并建立控制通道
pub fn connect(config: &TransportConfig) -> Result<TcpControlChannel, TransportError> {
    debug!("Connecting to Loomo...");
    let addr = discover(config.discovery_port, config.discovery_timeout())?;
    TcpControlChannel::connect(addr)
}

/// 到机器人的 TCP 控制通道
#[derive(Debug)]
pub struct TcpControlChannel {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpControlChannel {
    pub fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| TransportError::Connection(format!("dialling TCP {addr}: {e}")))?;
        stream.set_nodelay(true)?;
        debug!("Connected to Loomo at {}", addr);
        Ok(Self { stream, peer: addr })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl CommandSink for TcpControlChannel {
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError> {
        let bytes = command.encode();
        trace!("Writing {:?} ({} bytes)", command.tag(), bytes.len());
        self.stream.write_all(&bytes)?;
        Ok(())
    }
}
