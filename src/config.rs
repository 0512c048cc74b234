use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::consts::{APPEARANCE_KEYBOARD, KEY_SPACE};
use crate::hid::KeyboardConfig;
use crate::touch::{RearmPolicy, TouchConfig};

/// Touch pad to BLE keyboard bridge.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Advertised device name
    #[arg(long, default_value = "ESP Space")]
    pub name: String,

    /// Touch sensor pin
    #[arg(long, default_value_t = 32)]
    pub touch_pin: u8,

    /// Readings below this count as a touch
    #[arg(long, default_value_t = 800)]
    pub threshold: u16,

    /// Minimum gap between two accepted touches
    #[arg(long, default_value_t = 300)]
    pub debounce_ms: u64,

    /// Indicator LED pin
    #[arg(long, default_value_t = 2)]
    pub led_pin: u8,

    /// How long the key is held down before release
    #[arg(long, default_value_t = 75)]
    pub hold_ms: u64,

    /// HID usage to send: decimal, 0x-prefixed hex, or "space"
    #[arg(long, default_value = "0x2C", value_parser = parse_key_code)]
    pub key_code: u8,

    #[arg(long, default_value_t = 20)]
    pub poll_ms: u64,

    /// Pause after a transient sensor or radio fault
    #[arg(long, default_value_t = 1000)]
    pub backoff_ms: u64,

    #[arg(long, default_value_t = 500_000)]
    pub adv_interval_us: u32,

    /// Keep firing while the pad stays touched (once per debounce window)
    #[arg(long)]
    pub repeat_while_held: bool,

    /// Replay readings from a file instead of reading stdin
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

fn parse_key_code(s: &str) -> Result<u8, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("space") {
        return Ok(KEY_SPACE);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid key code {s:?}: {e}"))
}

impl Cli {
    pub fn keyboard_config(&self) -> KeyboardConfig {
        KeyboardConfig {
            name: self.name.clone(),
            appearance: APPEARANCE_KEYBOARD,
            hold: Duration::from_millis(self.hold_ms),
            adv_interval_us: self.adv_interval_us,
        }
    }

    pub fn touch_config(&self) -> TouchConfig {
        TouchConfig {
            touch_pin: self.touch_pin,
            threshold: self.threshold,
            debounce: Duration::from_millis(self.debounce_ms),
            indicator_pin: self.led_pin,
            key_code: self.key_code,
            poll_interval: Duration::from_millis(self.poll_ms),
            error_backoff: Duration::from_millis(self.backoff_ms),
            rearm: if self.repeat_while_held {
                RearmPolicy::AfterWindow
            } else {
                RearmPolicy::OnRelease
            },
        }
    }
}
