use std::time::Duration;

use crate::adv;
use crate::connection::ConnectionManager;
use crate::consts::*;
use crate::error::Error;
use crate::radio::{CharDef, CharFlags, CharHandle, ConnHandle, RadioEvent, RadioStack, ServiceDef};

/// Keyboard report map: 8 modifier bits, 1 reserved byte, 6 key codes.
pub const HID_REPORT_DESCRIPTOR: [u8; 45] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    // Modifier byte
    0x19, 0xE0, //   Usage Minimum (Left Ctrl)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data,Var,Abs)
    // Reserved byte
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Const)
    // 6 Keycode array
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data,Array)
    0xC0, // End Collection
];

/// bcdHID 1.11, country 0, flags RemoteWake | NormallyConnectable
pub const HID_INFO: [u8; 4] = [0x11, 0x01, 0x00, 0x02];

pub const KEY_REPORT_LEN: usize = 8;

/// One Input Report frame: `[modifier][reserved][key1..key6]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keys: [u8; 6],
}

impl KeyReport {
    /// Key down: `code` in the first key slot, everything else zero.
    pub const fn pressed(code: u8) -> Self {
        Self { modifier: 0, reserved: 0, keys: [code, 0, 0, 0, 0, 0] }
    }

    pub const fn released() -> Self {
        Self { modifier: 0, reserved: 0, keys: [0; 6] }
    }

    pub fn to_bytes(&self) -> [u8; KEY_REPORT_LEN] {
        let mut out = [0u8; KEY_REPORT_LEN];
        out[0] = self.modifier;
        out[1] = self.reserved;
        out[2..].copy_from_slice(&self.keys);
        out
    }
}

/// Primary HID service: Info, Report Map, Input Report, Protocol Mode, Control Point.
pub fn hid_service_def() -> ServiceDef {
    ServiceDef {
        uuid: UUID_HID_SERVICE,
        characteristics: vec![
            CharDef { uuid: UUID_HID_INFO, flags: CharFlags::READ },
            CharDef { uuid: UUID_HID_REPORT_MAP, flags: CharFlags::READ },
            CharDef {
                uuid: UUID_HID_REPORT,
                flags: CharFlags::READ | CharFlags::NOTIFY | CharFlags::WRITE,
            },
            CharDef { uuid: UUID_HID_PROTOCOL_MODE, flags: CharFlags::READ | CharFlags::WRITE },
            CharDef { uuid: UUID_HID_CONTROL_POINT, flags: CharFlags::WRITE },
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidHandles {
    pub info: CharHandle,
    pub report_map: CharHandle,
    pub input: CharHandle,
    pub protocol_mode: CharHandle,
    pub control_point: CharHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardConfig {
    pub name: String,
    pub appearance: u16,
    pub hold: Duration,
    pub adv_interval_us: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            name: "ESP Space".to_owned(),
            appearance: APPEARANCE_KEYBOARD,
            hold: Duration::from_millis(75),
            adv_interval_us: 500_000,
        }
    }
}

/// HID-over-GATT keyboard bound to one radio stack.
pub struct HidKeyboard<R> {
    radio: R,
    handles: HidHandles,
    conn: ConnectionManager,
    payload: Vec<u8>,
    /// Set when (re)advertising failed and has to be retried.
    needs_advertise: bool,
    config: KeyboardConfig,
}

impl<R: RadioStack> HidKeyboard<R> {
    /// Bring the radio up, publish the service and start advertising.
    pub async fn new(mut radio: R, config: KeyboardConfig) -> Result<Self, Error> {
        radio.activate().await?;

        let handles = match radio.register_gatt_service(&hid_service_def()).await?.as_slice() {
            &[info, report_map, input, protocol_mode, control_point] => {
                HidHandles { info, report_map, input, protocol_mode, control_point }
            }
            other => {
                return Err(Error::registration(format!(
                    "expected 5 characteristic handles, got {}",
                    other.len()
                )));
            }
        };

        radio.write_characteristic(handles.info, &HID_INFO).await?;
        radio.write_characteristic(handles.report_map, &HID_REPORT_DESCRIPTOR).await?;
        radio.write_characteristic(handles.protocol_mode, &[PROTOCOL_MODE_REPORT]).await?;
        radio.write_characteristic(handles.input, &KeyReport::released().to_bytes()).await?;
        radio.write_characteristic(handles.control_point, &[0x00]).await?;

        let payload = adv::build(&config.name, config.appearance, false, false);
        if payload.len() > MAX_LEGACY_ADV_LEN {
            tracing::warn!(len = payload.len(), "Advertising payload exceeds legacy limit");
        }

        let mut kb = Self {
            radio,
            handles,
            conn: ConnectionManager::new(),
            payload,
            needs_advertise: false,
            config,
        };
        kb.advertise().await?;
        tracing::info!(name = %kb.config.name, "BLE ready, advertising");
        Ok(kb)
    }

    async fn advertise(&mut self) -> Result<(), Error> {
        let res = self.radio.advertise(self.config.adv_interval_us, &self.payload).await;
        self.needs_advertise = res.is_err();
        res
    }

    /// Retry a failed advertise while no host is connected.
    pub async fn retry_advertise(&mut self) -> Result<(), Error> {
        if !self.needs_advertise || self.conn.is_connected() {
            return Ok(());
        }
        tracing::info!("Retrying advertising");
        self.advertise().await
    }

    pub fn needs_advertise(&self) -> bool {
        self.needs_advertise
    }

    /// Press and release `code`. Returns `Ok(false)` when no host is connected
    /// and the key was dropped.
    pub async fn send_key(&mut self, code: u8) -> Result<bool, Error> {
        let Some(conn) = self.conn.handle() else {
            tracing::debug!(code = %format!("{code:#04x}"), "No host connected, key dropped");
            return Ok(false);
        };

        self.notify(conn, KeyReport::pressed(code)).await?;
        tracing::trace!(%conn, code = %format!("{code:#04x}"), "TX keybd DOWN");

        tokio::time::sleep(self.config.hold).await;

        // Events are not serviced during the hold, so `conn` may be stale here.
        self.notify(conn, KeyReport::released()).await?;
        tracing::trace!(%conn, "TX keybd UP");
        Ok(true)
    }

    async fn notify(&mut self, conn: ConnHandle, report: KeyReport) -> Result<(), Error> {
        self.radio
            .notify_characteristic(conn, self.handles.input, &report.to_bytes())
            .await
    }

    pub async fn handle_event(&mut self, event: RadioEvent) -> Result<(), Error> {
        match event {
            RadioEvent::Connect(handle) => {
                self.conn.connect(handle);
                self.needs_advertise = false;
                tracing::info!(%handle, "Connected");
            }
            RadioEvent::Disconnect => {
                if self.conn.disconnect() {
                    tracing::info!("Disconnected, advertising again");
                    self.advertise().await?;
                } else {
                    tracing::debug!("Disconnect while not connected, ignored");
                }
            }
            RadioEvent::Write { handle, value } => self.on_write(handle, &value),
        }
        Ok(())
    }

    fn on_write(&self, handle: CharHandle, value: &[u8]) {
        if handle == self.handles.protocol_mode {
            // No Boot Keyboard Input Report, reports stay in Report protocol layout
            match value {
                [PROTOCOL_MODE_REPORT] => tracing::info!("Report protocol selected"),
                [PROTOCOL_MODE_BOOT] => tracing::warn!("Boot protocol unsupported, staying in Report protocol"),
                _ => tracing::warn!(?value, "Ignoring invalid protocol mode"),
            }
        } else if handle == self.handles.control_point {
            match value.first() {
                Some(&CONTROL_SUSPEND) => tracing::info!("Host suspended"),
                Some(&CONTROL_EXIT_SUSPEND) => tracing::info!("Host exited suspend"),
                _ => tracing::debug!(?value, "Unknown control point command"),
            }
        } else {
            tracing::debug!(?handle, ?value, "Write to other characteristic");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn.handle()
    }

    pub fn handles(&self) -> &HidHandles {
        &self.handles
    }

    pub fn advertising_payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }
}
