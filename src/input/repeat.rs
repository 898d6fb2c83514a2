//! Software key repeat
//!
//! [`RepeatState`] decides when the repeat timer has to be armed or
//! disarmed; the session turns those decisions into a calloop timer source.
//! Only one key repeats at a time: a press replaces the armed key, any
//! release clears it.

use std::time::Duration;

use xkbcommon::xkb::Keysym;

/// Repeat rate assumed until the compositor sends `repeat_info`
pub const DEFAULT_RATE: i32 = 25;
/// Delay assumed until the compositor sends `repeat_info`, in milliseconds
pub const DEFAULT_DELAY: i32 = 600;

/// What the timer has to do after an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Arm(Duration),
    Disarm,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatState {
    delay_ms: i32,
    /// -1 when repeat is disabled
    period_ms: i32,
    armed: Option<Keysym>,
}

impl Default for RepeatState {
    fn default() -> Self {
        let mut state = Self {
            delay_ms: 0,
            period_ms: -1,
            armed: None,
        };
        state.set_rate(DEFAULT_RATE, DEFAULT_DELAY);
        state
    }
}

impl RepeatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay_ms(&self) -> i32 {
        self.delay_ms
    }

    pub fn period_ms(&self) -> i32 {
        self.period_ms
    }

    pub fn armed(&self) -> Option<Keysym> {
        self.armed
    }

    pub fn is_enabled(&self) -> bool {
        self.period_ms >= 0
    }

    /// Apply `repeat_info`: `rate` in repeats per second, `delay` in ms
    pub fn set_rate(&mut self, rate: i32, delay: i32) -> TimerCommand {
        self.delay_ms = delay.max(0);
        self.period_ms = if rate > 0 { 1000 / rate } else { -1 };

        if !self.is_enabled() && self.armed.take().is_some() {
            return TimerCommand::Disarm;
        }
        TimerCommand::Keep
    }

    /// A key changed state
    pub fn on_key(&mut self, sym: Keysym, pressed: bool) -> TimerCommand {
        if !pressed {
            self.armed = None;
            return TimerCommand::Disarm;
        }
        if !self.is_enabled() {
            return TimerCommand::Keep;
        }
        self.armed = Some(sym);
        TimerCommand::Arm(self.delay())
    }

    /// The timer expired: the key to replay and the time until the next repeat
    pub fn on_fire(&mut self) -> Option<(Keysym, Duration)> {
        if !self.is_enabled() {
            self.armed = None;
            return None;
        }
        let sym = self.armed?;
        Some((sym, self.period()))
    }

    /// Keyboard focus went away
    pub fn cancel(&mut self) -> TimerCommand {
        self.armed = None;
        TimerCommand::Disarm
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms as u64)
    }

    // Rates above 1000/s would otherwise reschedule with a zero period
    fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1) as u64)
    }
}
