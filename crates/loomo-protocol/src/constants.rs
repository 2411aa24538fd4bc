//! 协议常量

/// 单个传感器数据报的最大字节数（含头）
pub const MAX_PACKET_SIZE: usize = 8192;

/// 传感器数据报头长度
pub const HEADER_SIZE: usize = 24;

/// 单个数据报可携带的最大负载
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// 控制命令前缀长度（标签 + 长度）
pub const COMMAND_PREFIX_SIZE: usize = 8;

/// 机器人广播控制端口的 UDP 端口
pub const DISCOVERY_PORT: u16 = 1336;

/// 摄像头流默认端口
pub const DEFAULT_CAMERA_PORT: u16 = 1339;
