//! # Loomo AI
//!
//! 车道跟随运动状态机：输入是每帧两组车道标记和识别出的交通标志，
//! 输出是线速度/角速度命令。
//!
//! ## 状态
//!
//! - **Idle**：初始状态，速度为零，忽略所有输入
//! - **FollowPostits**：沿两组标记的中线行驶，稳定的近距离标志触发对应状态
//! - **Uturn**：原地旋转，直到两侧标记左右顺序翻转
//! - **Stop**：停车一段时间，再跟随车道驶过停车线，到期后回到 FollowPostits
//!
//! ## 使用
//!
//! ```no_run
//! use crossbeam_channel::unbounded;
//! use loomo_ai::{AiConfig, MovementAi, spawn_feature_loop, spawn_sign_loop};
//! use loomo_geometry::DistanceLookup;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! let (commands, _to_dispatcher) = unbounded();
//! let ai = MovementAi::new(commands, Arc::new(DistanceLookup::new()), AiConfig::default());
//! let ai = Arc::new(Mutex::new(ai));
//! ai.lock().start_postits(Instant::now());
//!
//! let (_features_tx, features) = unbounded();
//! let (_signs_tx, signs) = unbounded();
//! spawn_feature_loop(ai.clone(), features).unwrap();
//! spawn_sign_loop(ai, signs).unwrap();
//! ```

mod config;
mod driver;
mod feature;
mod movement;
mod state;

pub use config::AiConfig;
pub use driver::{run_feature_loop, run_sign_loop, spawn_feature_loop, spawn_sign_loop};
pub use feature::{Feature, FeatureBatch, SignKind, TrafficSignFeature, nearest};
pub use movement::MovementAi;
pub use state::{StateId, Velocity};
