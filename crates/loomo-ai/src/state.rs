//! 运动状态
//!
//! 四个状态组成一个封闭集合，用枚举表示。状态处理函数不直接改变
//! 当前状态，而是在 [`Outcome::next`] 中给出要切换到的状态，由
//! [`MovementAi`](crate::MovementAi) 统一执行切换。
//!
//! 转换表：
//!
//! | 当前 | 事件 | 下一个 |
//! |---|---|---|
//! | FollowPostits | 两组标记都为空 | Uturn |
//! | FollowPostits | 稳定且足够近的 stop 标志 | Stop |
//! | FollowPostits | 稳定且足够近的 uturn 标志 | Uturn |
//! | Uturn | 两侧最近标记都在范围内且左右顺序翻转 | FollowPostits |
//! | Stop | 冷却期到期 | FollowPostits |
//! | Stop（停车期之后） | 内部 FollowPostits 的转换 | 同左 |

use crate::feature::{FeatureBatch, SignKind, TrafficSignFeature, nearest, pixels};
use crate::AiConfig;
use loomo_geometry::{DistanceLookup, GroundPoint, PIXEL_HORIZON, fit_path};
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

/// 一对速度（线速度，角速度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub linear: f32,
    pub angular: f32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity::new(0.0, 0.0);

    pub const fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }
}

/// 状态标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Idle,
    FollowPostits,
    Uturn,
    Stop,
}

impl StateId {
    pub fn name(&self) -> &'static str {
        match self {
            StateId::Idle => "Idle",
            StateId::FollowPostits => "FollowPostits",
            StateId::Uturn => "Uturn",
            StateId::Stop => "Stop",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<SignKind> for StateId {
    fn from(kind: SignKind) -> Self {
        match kind {
            SignKind::Stop => StateId::Stop,
            SignKind::Uturn => StateId::Uturn,
        }
    }
}

/// 状态处理函数能看到的 AI 上下文
pub(crate) struct Context<'a> {
    pub config: &'a AiConfig,
    pub lookup: &'a DistanceLookup,
    pub direction: i32,
    pub last: Velocity,
}

/// 一次处理的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Outcome {
    pub velocity: Velocity,
    pub next: Option<StateId>,
}

impl Outcome {
    fn stay(velocity: Velocity) -> Self {
        Self {
            velocity,
            next: None,
        }
    }

    fn switch(next: StateId, velocity: Velocity) -> Self {
        Self {
            velocity,
            next: Some(next),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum State {
    Idle,
    FollowPostits(FollowPostits),
    Uturn(Uturn),
    Stop(Stop),
}

impl State {
    /// 进入状态（start 钩子）
    pub fn enter(id: StateId, ctx: &Context<'_>, now: Instant) -> Self {
        match id {
            StateId::Idle => State::Idle,
            StateId::FollowPostits => State::FollowPostits(FollowPostits::default()),
            StateId::Uturn => State::Uturn(Uturn {
                old_direction: ctx.direction,
            }),
            StateId::Stop => State::Stop(Stop {
                active_until: now + ctx.config.stop_active(),
                cooldown_until: now + ctx.config.stop_cooldown(),
                follow: FollowPostits::default(),
            }),
        }
    }

    pub fn id(&self) -> StateId {
        match self {
            State::Idle => StateId::Idle,
            State::FollowPostits(_) => StateId::FollowPostits,
            State::Uturn(_) => StateId::Uturn,
            State::Stop(_) => StateId::Stop,
        }
    }

    pub fn handle_features(
        &mut self,
        ctx: &Context<'_>,
        batch: &FeatureBatch,
        now: Instant,
    ) -> Outcome {
        match self {
            State::Idle => Outcome::stay(Velocity::ZERO),
            State::FollowPostits(follow) => follow.handle_features(ctx, batch),
            State::Uturn(uturn) => uturn.handle_features(ctx, batch),
            State::Stop(stop) => stop.handle_features(ctx, batch, now),
        }
    }

    pub fn handle_sign(
        &mut self,
        ctx: &Context<'_>,
        sign: &TrafficSignFeature,
        now: Instant,
    ) -> Outcome {
        match self {
            State::Idle => Outcome::stay(Velocity::ZERO),
            State::FollowPostits(follow) => follow.handle_sign(ctx, sign),
            State::Uturn(_) => Outcome::stay(ctx.last),
            State::Stop(stop) => stop.handle_sign(ctx, now),
        }
    }

    /// 下一个需要在没有输入时也要处理的时间点
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            State::Stop(stop) => Some(stop.cooldown_until),
            _ => None,
        }
    }

    /// 到期后的转换
    pub fn expired(&self, now: Instant) -> Option<StateId> {
        match self {
            State::Stop(stop) if now >= stop.cooldown_until => Some(StateId::FollowPostits),
            _ => None,
        }
    }
}

/// 沿两组标记中间行驶
#[derive(Debug, Clone)]
pub(crate) struct FollowPostits {
    sign_counter: u32,
    sign_index: i64,
}

impl Default for FollowPostits {
    fn default() -> Self {
        Self {
            sign_counter: 0,
            sign_index: -1,
        }
    }
}

impl FollowPostits {
    fn handle_features(&mut self, ctx: &Context<'_>, batch: &FeatureBatch) -> Outcome {
        let config = ctx.config;
        let direction = ctx.direction as f32;

        match (batch.left.is_empty(), batch.right.is_empty()) {
            (false, true) => Outcome::stay(Velocity::new(
                config.search_velocity,
                config.search_velocity * direction,
            )),
            (true, false) => Outcome::stay(Velocity::new(
                config.search_velocity,
                -config.search_velocity * direction,
            )),
            (true, true) => Outcome::switch(StateId::Uturn, Velocity::ZERO),
            (false, false) => match steer(ctx, batch) {
                Some(velocity) => Outcome::stay(velocity),
                None => Outcome::stay(ctx.last),
            },
        }
    }

    fn handle_sign(&mut self, ctx: &Context<'_>, sign: &TrafficSignFeature) -> Outcome {
        if sign.index != self.sign_index {
            self.sign_counter = 0;
            self.sign_index = sign.index;
            return Outcome::stay(ctx.last);
        }

        self.sign_counter += 1;
        if self.sign_counter <= ctx.config.sign_confidence_threshold {
            return Outcome::stay(ctx.last);
        }

        let distance = sign
            .feature
            .ground(ctx.lookup)
            .map(|ground| ground.norm())
            .unwrap_or(f64::INFINITY);
        if distance >= ctx.config.sign_trigger_distance_cm {
            return Outcome::stay(ctx.last);
        }

        match SignKind::from_name(&sign.name) {
            Some(kind) => Outcome::switch(kind.into(), ctx.last),
            None => {
                debug!("Ignoring unsupported traffic sign '{}'", sign.name);
                Outcome::stay(ctx.last)
            },
        }
    }
}

/// 拟合左右两条路径，按中线的横向偏差转向
///
/// 任一路径拟合失败返回 `None`。
fn steer(ctx: &Context<'_>, batch: &FeatureBatch) -> Option<Velocity> {
    let config = ctx.config;
    let left = fit_path(
        &pixels(&batch.left),
        GroundPoint::new(-config.lane_offset_cm, 0.0),
        config.knot_reach_cm,
        ctx.lookup,
    );
    let right = fit_path(
        &pixels(&batch.right),
        GroundPoint::new(config.lane_offset_cm, 0.0),
        config.knot_reach_cm,
        ctx.lookup,
    );
    let (left, right) = match (left, right) {
        (Ok(left), Ok(right)) => (left, right),
        (Err(e), _) | (_, Err(e)) => {
            trace!("Lane path not available: {}", e);
            return None;
        },
    };

    let samples = config.sample_count.max(1);
    let mut sum = 0.0;
    for i in 0..samples {
        let t = config.lookahead * (i + 1) as f64 / samples as f64;
        let mid = (left.point(t) + right.point(t)) / 2.0;
        sum += mid.x + config.camera_offset_cm;
    }
    let disposition = sum / samples as f64;

    let max_av = config.max_angular_velocity;
    let angular = if disposition.abs() > config.saturation_threshold_cm {
        max_av * -signum(disposition) as f32
    } else {
        // 2 位小数
        max_av * ((-disposition * 2.5).round() / 100.0) as f32
    };
    let linear = config.max_linear_velocity - angular.abs();

    Some(Velocity::new(linear, angular))
}

/// 原地掉头，直到两侧标记的左右顺序翻转
#[derive(Debug, Clone)]
pub(crate) struct Uturn {
    old_direction: i32,
}

impl Uturn {
    fn handle_features(&mut self, ctx: &Context<'_>, batch: &FeatureBatch) -> Outcome {
        let turning = Outcome::stay(Velocity::new(0.0, ctx.config.uturn_velocity));

        let (Some(near0), Some(near1)) = (nearest(&batch.left), nearest(&batch.right)) else {
            return turning;
        };
        if near0.image_pos.y <= PIXEL_HORIZON || near1.image_pos.y <= PIXEL_HORIZON {
            return turning;
        }

        let (Ok(d0), Ok(d1)) = (
            ctx.lookup.ground_distance(near0.image_pos),
            ctx.lookup.ground_distance(near1.image_pos),
        ) else {
            return turning;
        };

        let reach = ctx.config.uturn_reach_cm;
        if d0 < reach && d1 < reach {
            let current = signum((near0.image_pos.x - near1.image_pos.x) as f64);
            if current != self.old_direction {
                return Outcome::switch(StateId::FollowPostits, Velocity::ZERO);
            }
        }

        turning
    }
}

/// 先停车，再跟随车道驶过停车线，最后回到 FollowPostits
#[derive(Debug, Clone)]
pub(crate) struct Stop {
    active_until: Instant,
    cooldown_until: Instant,
    follow: FollowPostits,
}

impl Stop {
    fn handle_features(
        &mut self,
        ctx: &Context<'_>,
        batch: &FeatureBatch,
        now: Instant,
    ) -> Outcome {
        if now < self.active_until {
            return Outcome::stay(Velocity::ZERO);
        }
        self.follow.handle_features(ctx, batch)
    }

    fn handle_sign(&self, ctx: &Context<'_>, now: Instant) -> Outcome {
        if now < self.active_until {
            Outcome::stay(Velocity::ZERO)
        } else {
            Outcome::stay(ctx.last)
        }
    }
}

/// 符号函数，0 映射到 0
pub(crate) fn signum(value: f64) -> i32 {
    if value < 0.0 {
        -1
    } else if value > 0.0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Feature;
    use approx::assert_abs_diff_eq;
    use loomo_geometry::PixelPoint;
    use std::time::Duration;

    fn lane(x: i32) -> Vec<Feature> {
        [470, 400]
            .iter()
            .map(|y| Feature::new(PixelPoint::new(x, *y)))
            .collect()
    }

    fn context<'a>(config: &'a AiConfig, lookup: &'a DistanceLookup) -> Context<'a> {
        Context {
            config,
            lookup,
            direction: -1,
            last: Velocity::new(0.25, 0.05),
        }
    }

    #[test]
    fn test_signum() {
        assert_eq!(signum(-3.0), -1);
        assert_eq!(signum(0.0), 0);
        assert_eq!(signum(2.5), 1);
    }

    #[test]
    fn test_centered_lane_steers_against_camera_offset() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);

        let mut follow = FollowPostits::default();
        let batch = FeatureBatch::new(lane(200), lane(440));
        let outcome = follow.handle_features(&ctx, &batch);

        // 中线在 0 附近，摄像头偏移 -8cm → 向左修正 0.4·0.2
        assert_eq!(outcome.next, None);
        assert_abs_diff_eq!(outcome.velocity.angular, 0.08, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.velocity.linear, 0.32, epsilon = 1e-6);
    }

    #[test]
    fn test_far_off_lane_saturates() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);

        // 两组标记都贴着图像右边缘
        let column = |x: i32| -> Vec<Feature> {
            [470, 440, 410, 380, 350]
                .iter()
                .map(|y| Feature::new(PixelPoint::new(x, *y)))
                .collect()
        };
        let mut follow = FollowPostits::default();
        let batch = FeatureBatch::new(column(620), column(639));
        let outcome = follow.handle_features(&ctx, &batch);
        assert_abs_diff_eq!(outcome.velocity.angular, -0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.velocity.linear, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_one_sided_search() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let mut follow = FollowPostits::default();

        let only_left = FeatureBatch::new(lane(200), vec![]);
        assert_eq!(
            follow.handle_features(&ctx, &only_left).velocity,
            Velocity::new(0.1, -0.1)
        );
        let only_right = FeatureBatch::new(vec![], lane(440));
        assert_eq!(
            follow.handle_features(&ctx, &only_right).velocity,
            Velocity::new(0.1, 0.1)
        );
    }

    #[test]
    fn test_unfittable_lane_repeats_last_velocity() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let mut follow = FollowPostits::default();

        // 地平线以上的标记无法投影，路径只剩起点
        let above = vec![Feature::new(PixelPoint::new(200, 100))];
        let batch = FeatureBatch::new(above, lane(440));
        let outcome = follow.handle_features(&ctx, &batch);
        assert_eq!(outcome, Outcome::stay(ctx.last));
    }

    #[test]
    fn test_sign_needs_stable_index_and_distance() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let mut follow = FollowPostits::default();

        let far = Feature::default().with_ground_pos(GroundPoint::new(0.0, 150.0));
        let far_sign = TrafficSignFeature::new(far, "stop", 3);
        for _ in 0..20 {
            assert_eq!(follow.handle_sign(&ctx, &far_sign).next, None);
        }

        // 编号变化时计数清零
        let near = Feature::default().with_ground_pos(GroundPoint::new(0.0, 60.0));
        let near_sign = TrafficSignFeature::new(near, "uturn", 4);
        for _ in 0..11 {
            assert_eq!(follow.handle_sign(&ctx, &near_sign).next, None);
        }
        let outcome = follow.handle_sign(&ctx, &near_sign);
        assert_eq!(outcome.next, Some(StateId::Uturn));
        assert_eq!(outcome.velocity, ctx.last);
    }

    #[test]
    fn test_unknown_sign_name_is_ignored() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let mut follow = FollowPostits::default();

        let near = Feature::default().with_ground_pos(GroundPoint::new(0.0, 60.0));
        let sign = TrafficSignFeature::new(near, "yield", 1);
        for _ in 0..30 {
            assert_eq!(follow.handle_sign(&ctx, &sign), Outcome::stay(ctx.last));
        }
    }

    #[test]
    fn test_uturn_ignores_markers_above_horizon() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let mut uturn = Uturn { old_direction: -1 };

        let high = vec![Feature::new(PixelPoint::new(440, PIXEL_HORIZON))];
        let batch = FeatureBatch::new(high, lane(200));
        assert_eq!(
            uturn.handle_features(&ctx, &batch),
            Outcome::stay(Velocity::new(0.0, 0.2))
        );
    }

    #[test]
    fn test_stop_phases() {
        let config = AiConfig::default();
        let lookup = DistanceLookup::new();
        let ctx = context(&config, &lookup);
        let start = Instant::now();

        let mut state = State::enter(StateId::Stop, &ctx, start);
        assert_eq!(state.deadline(), Some(start + Duration::from_secs(10)));

        let batch = FeatureBatch::new(lane(200), lane(440));
        let active = state.handle_features(&ctx, &batch, start + Duration::from_secs(1));
        assert_eq!(active, Outcome::stay(Velocity::ZERO));

        let crossing = state.handle_features(&ctx, &batch, start + Duration::from_secs(6));
        assert!(crossing.velocity.linear > 0.0);

        // 停车期之后内部 FollowPostits 的转换照常生效
        let empty = FeatureBatch::default();
        let lost = state.handle_features(&ctx, &empty, start + Duration::from_secs(7));
        assert_eq!(lost.next, Some(StateId::Uturn));

        assert_eq!(state.expired(start + Duration::from_secs(9)), None);
        assert_eq!(
            state.expired(start + Duration::from_secs(10)),
            Some(StateId::FollowPostits)
        );
    }
}
