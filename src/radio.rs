//! The seam between the keyboard and whatever radio stack carries it.

use std::fmt;
use std::ops::BitOr;

use crate::error::Error;

/// Opaque characteristic handle handed out at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharHandle(pub u16);

/// Opaque identifier of the connected host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharFlags(u8);

impl CharFlags {
    pub const READ: CharFlags = CharFlags(0x02);
    pub const WRITE: CharFlags = CharFlags(0x08);
    pub const NOTIFY: CharFlags = CharFlags(0x10);

    pub const fn contains(self, other: CharFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CharFlags {
    type Output = CharFlags;

    fn bitor(self, rhs: CharFlags) -> CharFlags {
        CharFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharDef {
    pub uuid: u16,
    pub flags: CharFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    pub uuid: u16,
    pub characteristics: Vec<CharDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    Connect(ConnHandle),
    Disconnect,
    /// The host wrote a writable characteristic.
    Write { handle: CharHandle, value: Vec<u8> },
}

/// Operations the keyboard needs from a BLE peripheral stack.
///
/// Connection events are not part of the trait: implementations push
/// [`RadioEvent`]s into the channel they were constructed with.
#[allow(async_fn_in_trait)]
pub trait RadioStack {
    async fn activate(&mut self) -> Result<(), Error>;

    /// Registers one primary service; handles come back in characteristic order.
    async fn register_gatt_service(&mut self, service: &ServiceDef) -> Result<Vec<CharHandle>, Error>;

    async fn write_characteristic(&mut self, handle: CharHandle, value: &[u8]) -> Result<(), Error>;

    async fn notify_characteristic(
        &mut self,
        conn: ConnHandle,
        handle: CharHandle,
        value: &[u8],
    ) -> Result<(), Error>;

    async fn advertise(&mut self, interval_us: u32, payload: &[u8]) -> Result<(), Error>;
}
