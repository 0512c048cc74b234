#![allow(dead_code)]

use std::collections::HashMap;

use tokio::time::Instant;
use touchkey::Error;
use touchkey::radio::{CharHandle, ConnHandle, RadioStack, ServiceDef};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Activate,
    Register(ServiceDef),
    Write(CharHandle, Vec<u8>),
    Notify { conn: ConnHandle, handle: CharHandle, value: Vec<u8>, at: Instant },
    Advertise { interval_us: u32, payload: Vec<u8> },
}

/// Records every call; characteristic values are kept per handle.
#[derive(Debug, Default)]
pub struct MockRadio {
    pub calls: Vec<Call>,
    pub values: HashMap<CharHandle, Vec<u8>>,
    pub fail_register: bool,
    pub fail_notifies: usize,
    /// 1-based index of the advertise call that fails.
    pub fail_advertise_nth: Option<usize>,
}

impl MockRadio {
    pub fn notifications(&self) -> Vec<(ConnHandle, CharHandle, Vec<u8>, Instant)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Notify { conn, handle, value, at } => Some((*conn, *handle, value.clone(), *at)),
                _ => None,
            })
            .collect()
    }

    pub fn advertisements(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Advertise { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }
}

impl RadioStack for MockRadio {
    async fn activate(&mut self) -> Result<(), Error> {
        self.calls.push(Call::Activate);
        Ok(())
    }

    async fn register_gatt_service(&mut self, service: &ServiceDef) -> Result<Vec<CharHandle>, Error> {
        self.calls.push(Call::Register(service.clone()));
        if self.fail_register {
            return Err(Error::Registration("stack out of attribute space".into()));
        }
        Ok((0..service.characteristics.len() as u16).map(|i| CharHandle(10 + i)).collect())
    }

    async fn write_characteristic(&mut self, handle: CharHandle, value: &[u8]) -> Result<(), Error> {
        self.calls.push(Call::Write(handle, value.to_vec()));
        self.values.insert(handle, value.to_vec());
        Ok(())
    }

    async fn notify_characteristic(
        &mut self,
        conn: ConnHandle,
        handle: CharHandle,
        value: &[u8],
    ) -> Result<(), Error> {
        if self.fail_notifies > 0 {
            self.fail_notifies -= 1;
            return Err(Error::Notify("link lost".into()));
        }
        self.calls.push(Call::Notify { conn, handle, value: value.to_vec(), at: Instant::now() });
        Ok(())
    }

    async fn advertise(&mut self, interval_us: u32, payload: &[u8]) -> Result<(), Error> {
        self.calls.push(Call::Advertise { interval_us, payload: payload.to_vec() });
        if self.fail_advertise_nth == Some(self.advertisements().len()) {
            return Err(Error::Advertise("controller busy".into()));
        }
        Ok(())
    }
}
