//! 发现 + 拨号集成测试
//!
//! 本机回环：一个线程反复向发现端口广播控制端口，直到 `connect` 返回。

use loomo_protocol::Command;
use loomo_transport::{CommandSink, TransportConfig, TransportError, connect};
use std::io::Read;
use std::net::{TcpListener, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// 绑定后立即释放，得到一个大概率空闲的 UDP 端口
fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn announce_until(
    stop: Arc<AtomicBool>,
    discovery_port: u16,
    body: String,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        while !stop.load(Ordering::SeqCst) {
            // 发现端口尚未绑定时的发送失败可以忽略
            let _ = socket.send_to(body.as_bytes(), ("127.0.0.1", discovery_port));
            thread::sleep(Duration::from_millis(20));
        }
    })
}

#[test]
fn test_connect_dials_announced_port() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let control = listener.local_addr().unwrap();
    let config = TransportConfig {
        discovery_port: free_udp_port(),
        discovery_timeout_ms: 5000,
        ..Default::default()
    };

    let stop = Arc::new(AtomicBool::new(false));
    let announcer = announce_until(
        stop.clone(),
        config.discovery_port,
        format!("{}\n", control.port()),
    );

    let result = connect(&config);
    stop.store(true, Ordering::SeqCst);
    announcer.join().unwrap();

    let mut channel = result.unwrap();
    assert_eq!(channel.peer_addr(), control);
    channel.send_command(&Command::SetLinearVelocity(0.2)).unwrap();
    drop(channel);

    let (mut socket, _) = listener.accept().unwrap();
    let mut bytes = Vec::new();
    socket.read_to_end(&mut bytes).unwrap();
    assert_eq!(
        Command::decode(&bytes).unwrap(),
        Command::SetLinearVelocity(0.2)
    );
}

#[test]
fn test_discovery_timeout_is_connection_error() {
    let config = TransportConfig {
        discovery_port: free_udp_port(),
        discovery_timeout_ms: 100,
        ..Default::default()
    };
    assert!(matches!(connect(&config), Err(TransportError::Connection(_))));
}

#[test]
fn test_invalid_announcement_is_connection_error() {
    let config = TransportConfig {
        discovery_port: free_udp_port(),
        discovery_timeout_ms: 5000,
        ..Default::default()
    };

    let stop = Arc::new(AtomicBool::new(false));
    let announcer = announce_until(stop.clone(), config.discovery_port, "robot\n".into());

    let result = connect(&config);
    stop.store(true, Ordering::SeqCst);
    announcer.join().unwrap();

    assert!(matches!(result, Err(TransportError::Connection(_))));
}
