//! 报警上报链路状态机
//!
//! 管理到TCP采集服务器的连接生命周期：网络可用性、连接/重连策略、报告发送

use crate::config;
use crate::println;
use crate::report::TelemetryReport;

/// 链路状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    // 网络不可用（WiFi未连接或未获取IP）
    Offline,

    // 网络可用但没有TCP连接
    Disconnected,
    Connecting,

    // 已连接
    Connected,
    Sending,

    // 重连次数用尽，等待网络重新关联
    Exhausted,
}

impl LinkState {
    /// Short label for the OLED status line
    pub fn label(&self) -> &'static str {
        match self {
            LinkState::Offline => "offline",
            LinkState::Disconnected => "idle",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "online",
            LinkState::Sending => "sending",
            LinkState::Exhausted => "gave up",
        }
    }
}

/// 链路事件枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    // 网络事件
    NetworkUp,
    NetworkDown,

    // 有新的报告等待发送
    ReportQueued,

    // TCP事件
    ConnectSucceeded,
    ConnectFailed,
    SendSucceeded,
    SendFailed,
    PeerClosed, // 服务器主动关闭连接，属于正常结束
}

/// 状态转换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// 保持当前状态
    Stay,
    /// 转换到新状态
    Transition(LinkState),
    /// 转换到新状态并重置重试计数
    TransitionWithReset(LinkState),
}

/// 状态机需要执行的动作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// 打开到采集服务器的连接（关闭之前的连接）
    OpenConnection { attempt: u32 },
    /// 发送报告
    SendReport(TelemetryReport),
    /// 关闭连接
    CloseConnection,
    /// 记录错误
    LogError(LinkState),
}

/// How long a connection lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Connect as soon as the network is up and keep the socket open between reports
    Persistent,
    /// Connect for each report and close after it was sent
    PerMessage,
}

/// Decision of the reconnect policy at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    Ready,
    Wait { remaining_ms: u64 },
    Exhausted,
}

/// Non-blocking reconnect policy: the first attempt is immediate, further ones
/// are spaced by `interval_ms`, and after `max_attempts` the caller gives up.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    interval_ms: u64,
    max_attempts: u32,
    attempts: u32,
    last_attempt_ms: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(config::RECONNECT_INTERVAL_MS, config::MAX_RECONNECT_ATTEMPTS)
    }
}

impl ReconnectPolicy {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
            attempts: 0,
            last_attempt_ms: None,
        }
    }

    pub fn poll(&self, now_ms: u64) -> AttemptDecision {
        if self.attempts >= self.max_attempts {
            return AttemptDecision::Exhausted;
        }
        match self.last_attempt_ms {
            None => AttemptDecision::Ready,
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                if elapsed >= self.interval_ms {
                    AttemptDecision::Ready
                } else {
                    AttemptDecision::Wait {
                        remaining_ms: self.interval_ms - elapsed,
                    }
                }
            }
        }
    }

    /// Records an attempt and returns its 1-based number
    pub fn record_attempt(&mut self, now_ms: u64) -> u32 {
        self.attempts += 1;
        self.last_attempt_ms = Some(now_ms);
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_attempt_ms = None;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// 发送统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u32,
    pub failed: u32,
    /// 被更新的报告覆盖而未发送的数量
    pub dropped: u32,
}

/// 状态指示灯闪烁模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPattern {
    Off,
    SlowBlink,
    FastBlink,
    On,
}

impl StatusPattern {
    /// Whether the LED is lit on the given 100 ms tick
    pub fn is_lit(&self, tick: u32) -> bool {
        match self {
            StatusPattern::Off => false,
            StatusPattern::SlowBlink => (tick / 10) % 2 == 0,
            StatusPattern::FastBlink => (tick / 2) % 2 == 0,
            StatusPattern::On => true,
        }
    }
}

/// 上报链路状态机
pub struct LinkStateMachine {
    current_state: LinkState,
    previous_state: Option<LinkState>,
    mode: ConnectionMode,
    policy: ReconnectPolicy,
    pending: Option<TelemetryReport>,
    in_flight: Option<TelemetryReport>,
    close_requested: bool,
    error_logged: bool,
    stats: LinkStats,
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new(ConnectionMode::Persistent, ReconnectPolicy::default())
    }
}

impl LinkStateMachine {
    /// 创建新的状态机实例
    pub fn new(mode: ConnectionMode, policy: ReconnectPolicy) -> Self {
        Self {
            current_state: LinkState::Offline,
            previous_state: None,
            mode,
            policy,
            pending: None,
            in_flight: None,
            close_requested: false,
            error_logged: false,
            stats: LinkStats::default(),
        }
    }

    /// 获取当前状态
    pub fn get_current_state(&self) -> LinkState {
        self.current_state
    }

    /// 获取上一个状态
    pub fn get_previous_state(&self) -> Option<LinkState> {
        self.previous_state
    }

    /// 获取重试次数
    pub fn get_retry_count(&self) -> u32 {
        self.policy.attempts()
    }

    pub fn get_stats(&self) -> LinkStats {
        self.stats
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn has_pending_report(&self) -> bool {
        self.pending.is_some()
    }

    /// 获取对应的状态灯模式
    pub fn get_status_pattern(&self) -> StatusPattern {
        match self.current_state {
            LinkState::Offline => StatusPattern::Off,
            LinkState::Disconnected | LinkState::Connecting => StatusPattern::SlowBlink,
            LinkState::Connected | LinkState::Sending => StatusPattern::On,
            LinkState::Exhausted => StatusPattern::FastBlink,
        }
    }

    /// Stores the newest report; an unsent older one is replaced
    pub fn queue_report(&mut self, report: TelemetryReport) -> StateTransition {
        if self.pending.replace(report).is_some() {
            self.stats.dropped += 1;
        }
        self.handle_event(LinkEvent::ReportQueued)
    }

    /// 处理链路事件
    pub fn handle_event(&mut self, event: LinkEvent) -> StateTransition {
        let transition = self.get_state_transition(self.current_state, event);
        self.apply_side_effects(event);

        match transition {
            StateTransition::Transition(new_state) => {
                self.transition_to_state(new_state);
            }
            StateTransition::TransitionWithReset(new_state) => {
                self.policy.reset();
                self.transition_to_state(new_state);
            }
            StateTransition::Stay => {}
        }

        transition
    }

    /// 状态机更新，返回需要执行的动作
    pub fn update(&mut self, now_ms: u64) -> alloc::vec::Vec<Action> {
        let mut actions = alloc::vec::Vec::new();

        if self.close_requested {
            self.close_requested = false;
            actions.push(Action::CloseConnection);
        }

        match self.current_state {
            LinkState::Offline | LinkState::Connecting | LinkState::Sending => {}

            LinkState::Disconnected => {
                let wants_connection =
                    self.mode == ConnectionMode::Persistent || self.pending.is_some();
                if wants_connection {
                    match self.policy.poll(now_ms) {
                        AttemptDecision::Ready => {
                            let attempt = self.policy.record_attempt(now_ms);
                            println!(
                                "[LINK] Connection attempt {}/{}",
                                attempt,
                                self.policy.max_attempts()
                            );
                            self.transition_to_state(LinkState::Connecting);
                            actions.push(Action::OpenConnection { attempt });
                        }
                        AttemptDecision::Wait { .. } => {}
                        AttemptDecision::Exhausted => {
                            self.transition_to_state(LinkState::Exhausted);
                        }
                    }
                }
            }

            LinkState::Connected => {
                if let Some(report) = self.pending.take() {
                    self.in_flight = Some(report);
                    self.transition_to_state(LinkState::Sending);
                    actions.push(Action::SendReport(report));
                }
            }

            LinkState::Exhausted => {
                if !self.error_logged {
                    self.error_logged = true;
                    actions.push(Action::LogError(self.current_state));
                }
            }
        }

        actions
    }

    /// 事件带来的附加效果（统计、待发报告、关闭连接）
    fn apply_side_effects(&mut self, event: LinkEvent) {
        match (self.current_state, event) {
            (LinkState::Sending, LinkEvent::SendSucceeded)
            | (LinkState::Sending, LinkEvent::PeerClosed) => {
                self.stats.sent += 1;
                self.in_flight = None;
                self.policy.reset();
                if self.mode == ConnectionMode::PerMessage && event == LinkEvent::SendSucceeded {
                    self.close_requested = true;
                }
            }
            (LinkState::Sending, LinkEvent::SendFailed) => {
                self.stats.failed += 1;
                self.close_requested = true;
                self.requeue_in_flight();
            }
            (LinkState::Connecting, LinkEvent::ConnectFailed) => {
                self.stats.failed += 1;
            }
            (LinkState::Connecting | LinkState::Connected | LinkState::Sending, LinkEvent::NetworkDown) => {
                self.close_requested = true;
                self.requeue_in_flight();
            }
            _ => {}
        }
    }

    /// 发送失败的报告在没有更新报告时保留重发
    fn requeue_in_flight(&mut self) {
        if let Some(report) = self.in_flight.take() {
            if self.pending.is_none() {
                self.pending = Some(report);
            } else {
                self.stats.dropped += 1;
            }
        }
    }

    /// 内部状态转换逻辑
    fn transition_to_state(&mut self, new_state: LinkState) {
        if new_state != self.current_state {
            match new_state {
                LinkState::Connected => println!("[LINK] Connected to collector"),
                LinkState::Offline => println!("[LINK] Network down, reporting paused"),
                LinkState::Exhausted => {
                    println!(
                        "[LINK] Giving up after {} attempts until the network reconnects",
                        self.policy.attempts()
                    );
                }
                _ => {} // Silent for normal transitions
            }

            if new_state != LinkState::Exhausted {
                self.error_logged = false;
            }
            self.previous_state = Some(self.current_state);
            self.current_state = new_state;
        }
    }

    /// 获取状态转换规则
    fn get_state_transition(&self, current_state: LinkState, event: LinkEvent) -> StateTransition {
        match (current_state, event) {
            // 网络断开：任何状态都回到离线
            (LinkState::Offline, LinkEvent::NetworkDown) => StateTransition::Stay,
            (_, LinkEvent::NetworkDown) => StateTransition::Transition(LinkState::Offline),

            // 网络恢复：重新开始重连计数
            (LinkState::Offline, LinkEvent::NetworkUp) => {
                StateTransition::TransitionWithReset(LinkState::Disconnected)
            }

            // 连接流程
            (LinkState::Connecting, LinkEvent::ConnectSucceeded) => {
                StateTransition::Transition(LinkState::Connected)
            }
            (LinkState::Connecting, LinkEvent::ConnectFailed) => {
                StateTransition::Transition(LinkState::Disconnected)
            }

            // 发送流程
            (LinkState::Sending, LinkEvent::SendSucceeded) => match self.mode {
                ConnectionMode::Persistent => StateTransition::Transition(LinkState::Connected),
                ConnectionMode::PerMessage => StateTransition::Transition(LinkState::Disconnected),
            },
            (LinkState::Sending, LinkEvent::SendFailed) => {
                StateTransition::Transition(LinkState::Disconnected)
            }

            // 服务器关闭连接，正常结束
            (LinkState::Connected | LinkState::Sending, LinkEvent::PeerClosed) => {
                StateTransition::Transition(LinkState::Disconnected)
            }

            // 默认情况：保持当前状态
            _ => StateTransition::Stay,
        }
    }

    /// 检查是否处于错误状态
    pub fn is_error_state(&self) -> bool {
        self.current_state == LinkState::Exhausted
    }

    /// 检查连接是否可用
    pub fn is_operational(&self) -> bool {
        matches!(
            self.current_state,
            LinkState::Connected | LinkState::Sending
        )
    }

    /// 强制转换到指定状态（用于测试和紧急情况）
    pub fn force_transition(&mut self, new_state: LinkState) {
        self.transition_to_state(new_state);
        self.policy.reset();
    }
}
