//! 运动 AI
//!
//! 持有当前状态、上一次发出的速度和左右方向信号，把状态给出的速度
//! 转成控制命令。只有数值变化时才发命令，超出上限的速度被丢弃。

use crate::feature::{FeatureBatch, TrafficSignFeature, nearest};
use crate::state::{Context, Outcome, State, StateId, Velocity, signum};
use crate::AiConfig;
use crossbeam_channel::Sender;
use loomo_geometry::DistanceLookup;
use loomo_protocol::Command;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace, warn};

/// 车道跟随状态机
pub struct MovementAi {
    commands: Sender<Command>,
    lookup: Arc<DistanceLookup>,
    config: AiConfig,
    state: State,
    last: Velocity,
    /// 1：第一组在右侧；-1：第一组在左侧
    direction: i32,
}

impl MovementAi {
    /// 新建，初始状态为 Idle
    pub fn new(commands: Sender<Command>, lookup: Arc<DistanceLookup>, config: AiConfig) -> Self {
        Self {
            commands,
            lookup,
            config,
            state: State::Idle,
            last: Velocity::ZERO,
            direction: 0,
        }
    }

    pub fn state(&self) -> StateId {
        self.state.id()
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// 最后一次发出的速度
    pub fn last_velocity(&self) -> Velocity {
        self.last
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 开始跟随车道
    pub fn start_postits(&mut self, now: Instant) {
        self.set_state(StateId::FollowPostits, now);
    }

    /// 处理一帧车道标记
    pub fn handle_features(&mut self, batch: &FeatureBatch, now: Instant) {
        self.poll(now);
        self.track_direction(batch);

        let ctx = Context {
            config: &self.config,
            lookup: &self.lookup,
            direction: self.direction,
            last: self.last,
        };
        let outcome = self.state.handle_features(&ctx, batch, now);
        self.apply(outcome, now);
    }

    /// 处理一个交通标志
    pub fn handle_sign(&mut self, sign: &TrafficSignFeature, now: Instant) {
        self.poll(now);

        let ctx = Context {
            config: &self.config,
            lookup: &self.lookup,
            direction: self.direction,
            last: self.last,
        };
        let outcome = self.state.handle_sign(&ctx, sign, now);
        self.apply(outcome, now);
    }

    /// 处理已到期的定时转换
    pub fn poll(&mut self, now: Instant) {
        if let Some(next) = self.state.expired(now) {
            self.set_state(next, now);
        }
    }

    /// 当前状态的下一个到期时间
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.deadline()
    }

    /// 车道标记输入结束
    pub fn features_closed(&mut self, now: Instant) {
        if matches!(self.state(), StateId::Uturn | StateId::FollowPostits) {
            self.set_state(StateId::Idle, now);
        }
    }

    /// 交通标志输入结束
    pub fn signs_closed(&mut self, now: Instant) {
        if self.state() == StateId::Stop {
            self.set_state(StateId::Idle, now);
        }
    }

    fn context(&self) -> Context<'_> {
        Context {
            config: &self.config,
            lookup: &self.lookup,
            direction: self.direction,
            last: self.last,
        }
    }

    fn apply(&mut self, outcome: Outcome, now: Instant) {
        if let Some(next) = outcome.next {
            self.set_state(next, now);
        }
        self.set_velocities(outcome.velocity);
    }

    /// 两组最近标记的左右顺序
    fn track_direction(&mut self, batch: &FeatureBatch) {
        if let (Some(a), Some(b)) = (nearest(&batch.left), nearest(&batch.right)) {
            self.direction = signum((a.image_pos.x - b.image_pos.x) as f64);
        }
    }

    /// 切换状态：旧状态的 stop 钩子在新状态的 start 钩子之前执行
    ///
    /// Stop 的定时器就是状态里的到期时间，随旧状态一起丢弃。
    fn set_state(&mut self, id: StateId, now: Instant) {
        let next = State::enter(id, &self.context(), now);
        self.state = next;
        info!("MovementAI in state {}", id);

        if id == StateId::Idle {
            self.set_velocities(Velocity::ZERO);
        }
    }

    fn set_velocities(&mut self, velocity: Velocity) {
        if velocity.linear.abs() > self.config.max_linear_velocity
            || velocity.angular.abs() > self.config.max_angular_velocity
        {
            trace!(
                "Velocity out of bounds, dropping (lv={}, av={})",
                velocity.linear, velocity.angular
            );
            return;
        }

        if velocity.linear != self.last.linear {
            self.last.linear = velocity.linear;
            self.emit(Command::SetLinearVelocity(velocity.linear));
        }
        if velocity.angular != self.last.angular {
            self.last.angular = velocity.angular;
            self.emit(Command::SetAngularVelocity(velocity.angular));
        }
    }

    fn emit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Command queue closed, dropping {:?}", command);
        }
    }
}

impl std::fmt::Debug for MovementAi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementAi")
            .field("state", &self.state())
            .field("direction", &self.direction)
            .field("last", &self.last)
            .finish()
    }
}
