//! Threshold + debounce sampling of the touch pad.

use std::time::Duration;

use tokio::time::Instant;

use crate::consts::KEY_SPACE;
use crate::error::Error;
use crate::gpio::Gpio;
use crate::hid::HidKeyboard;
use crate::radio::RadioStack;
use crate::sensor::TouchSensor;

/// When a held touch may fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RearmPolicy {
    /// The reading has to come back to the threshold before the next event.
    #[default]
    OnRelease,
    /// A sustained touch fires again every time the window elapses.
    AfterWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchConfig {
    pub touch_pin: u8,
    pub threshold: u16,
    pub debounce: Duration,
    pub indicator_pin: u8,
    pub key_code: u8,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub rearm: RearmPolicy,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            touch_pin: 32,
            threshold: 800,
            debounce: Duration::from_millis(300),
            indicator_pin: 2,
            key_code: KEY_SPACE,
            poll_interval: Duration::from_millis(20),
            error_backoff: Duration::from_secs(1),
            rearm: RearmPolicy::OnRelease,
        }
    }
}

#[derive(Debug)]
pub struct Debouncer {
    threshold: u16,
    window: Duration,
    rearm: RearmPolicy,
    last_accepted: Option<Instant>,
    armed: bool,
}

impl Debouncer {
    pub fn new(threshold: u16, window: Duration, rearm: RearmPolicy) -> Self {
        Self { threshold, window, rearm, last_accepted: None, armed: true }
    }

    /// Feed one reading; true when it is accepted as a new touch event.
    pub fn observe(&mut self, value: u16, now: Instant) -> bool {
        if value >= self.threshold {
            self.armed = true;
            return false;
        }
        if self.rearm == RearmPolicy::OnRelease && !self.armed {
            return false;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) <= self.window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        self.armed = false;
        true
    }

    #[cfg(test)]
    pub(crate) fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

/// Owns the sensor, the indicator and the debounce state.
pub struct TouchSampler<S, G> {
    sensor: S,
    indicator: G,
    debouncer: Debouncer,
    config: TouchConfig,
}

impl<S: TouchSensor, G: Gpio> TouchSampler<S, G> {
    pub fn new(sensor: S, mut indicator: G, config: TouchConfig) -> Self {
        indicator.set_output(config.indicator_pin, false);
        let debouncer = Debouncer::new(config.threshold, config.debounce, config.rearm);
        Self { sensor, indicator, debouncer, config }
    }

    /// One sampling iteration. Returns the accepted reading, if any.
    pub async fn poll<R: RadioStack>(
        &mut self,
        keyboard: &mut HidKeyboard<R>,
    ) -> Result<Option<u16>, Error> {
        let value = self.sensor.read()?;
        if !self.debouncer.observe(value, Instant::now()) {
            return Ok(None);
        }

        tracing::info!(%value, code = %format!("{:#04x}", self.config.key_code), "Touch, sending key");
        self.indicator.set_output(self.config.indicator_pin, true);
        let sent = keyboard.send_key(self.config.key_code).await;
        self.indicator.set_output(self.config.indicator_pin, false);
        sent?;
        Ok(Some(value))
    }

    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    pub fn indicator(&self) -> &G {
        &self.indicator
    }
}
