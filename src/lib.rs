pub mod adv;
pub mod app;
pub mod ble;
pub mod config;
pub mod connection;
pub mod consts;
pub mod error;
pub mod gpio;
pub mod hid;
pub mod radio;
pub mod sensor;
pub mod touch;

pub use error::Error;
