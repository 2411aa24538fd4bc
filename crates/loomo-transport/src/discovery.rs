//! 机器人地址发现
//!
//! 机器人在固定端口上广播一个数据报，内容是控制通道的 TCP 端口（以换行结尾），
//! IP 取自数据报的源地址。

use crate::TransportError;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info};

const ANNOUNCEMENT_BUFFER_SIZE: usize = 1024;

/// 等待一次广播并返回控制通道地址
///
/// `timeout` 为 `None` 时一直阻塞。
pub fn discover(port: u16, timeout: Option<Duration>) -> Result<SocketAddr, TransportError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(|e| {
        TransportError::Connection(format!("listening for broadcast on port {port}: {e}"))
    })?;
    socket.set_read_timeout(timeout).map_err(|e| {
        TransportError::Connection(format!("setting discovery timeout on port {port}: {e}"))
    })?;

    debug!("Waiting for Loomo broadcast on port {}", port);
    let mut buf = [0u8; ANNOUNCEMENT_BUFFER_SIZE];
    let (n, source) = socket.recv_from(&mut buf).map_err(|e| {
        TransportError::Connection(format!("reading broadcast from port {port}: {e}"))
    })?;

    let addr = parse_announcement(&buf[..n], source)?;
    info!("Discovered Loomo control channel at {}", addr);
    Ok(addr)
}

/// 解析广播内容
///
/// 接受 `"4444\n"`、`"4444"` 和 `":4444"`。
pub fn parse_announcement(body: &[u8], source: SocketAddr) -> Result<SocketAddr, TransportError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| TransportError::Connection(format!("broadcast is not UTF-8: {e}")))?;
    let port_text = text.trim_end_matches(['\r', '\n']).trim_start_matches(':');
    let port: u16 = port_text.parse().map_err(|e| {
        TransportError::Connection(format!("invalid control port {port_text:?} in broadcast: {e}"))
    })?;
    Ok(SocketAddr::new(source.ip(), port))
}
