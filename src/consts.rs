// Common constants for HID over GATT profile and device identity

pub const UUID_HID_SERVICE: u16 = 0x1812;

pub const UUID_HID_INFO: u16 = 0x2A4A;
pub const UUID_HID_REPORT_MAP: u16 = 0x2A4B;
pub const UUID_HID_CONTROL_POINT: u16 = 0x2A4C;
pub const UUID_HID_REPORT: u16 = 0x2A4D;
pub const UUID_HID_PROTOCOL_MODE: u16 = 0x2A4E;

pub const APPEARANCE_KEYBOARD: u16 = 961; // 0x03C1

// Advertising data types
pub const AD_FLAGS: u8 = 0x01;
pub const AD_UUID16_COMPLETE: u8 = 0x03;
pub const AD_NAME_COMPLETE: u8 = 0x09;
pub const AD_APPEARANCE: u8 = 0x19;

// Flags bits
pub const ADV_FLAG_LIMITED_DISC: u8 = 0x01;
pub const ADV_FLAG_GENERAL_DISC: u8 = 0x02;
pub const ADV_FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;
pub const ADV_FLAG_LE_BR_EDR: u8 = 0x18;

pub const MAX_LEGACY_ADV_LEN: usize = 31;

// Protocol Mode values
pub const PROTOCOL_MODE_BOOT: u8 = 0x00;
pub const PROTOCOL_MODE_REPORT: u8 = 0x01;

// Control Point commands
pub const CONTROL_SUSPEND: u8 = 0x00;
pub const CONTROL_EXIT_SUSPEND: u8 = 0x01;

pub const KEY_SPACE: u8 = 0x2C;
