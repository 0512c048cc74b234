//! [`RadioStack`] on top of `ble-peripheral-rust`.
//!
//! The stack addresses characteristics by UUID and has no connection events,
//! so this module keeps a handle table and value store, and treats a
//! subscription to the Input Report as the host connecting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use ble_peripheral_rust::{
    Peripheral, PeripheralImpl,
    gatt::{
        characteristic::Characteristic,
        peripheral_event::{
            PeripheralEvent, ReadRequestResponse, RequestResponse, WriteRequestResponse,
        },
        properties::{AttributePermission, CharacteristicProperty},
        service::Service,
    },
    uuid::ShortUuid,
};

use crate::adv::AdvFields;
use crate::error::Error;
use crate::radio::{CharFlags, CharHandle, ConnHandle, RadioEvent, RadioStack, ServiceDef};

#[derive(Debug, Default)]
struct Attributes {
    handles: HashMap<Uuid, CharHandle>,
    flags: HashMap<Uuid, CharFlags>,
    values: HashMap<Uuid, Vec<u8>>,
}

type SharedAttributes = Arc<Mutex<Attributes>>;

fn lock(attrs: &SharedAttributes) -> MutexGuard<'_, Attributes> {
    attrs.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BlePeripheral {
    peripheral: Peripheral,
    attrs: SharedAttributes,
    uuids: HashMap<CharHandle, Uuid>,
    service: Option<ServiceDef>,
    published: bool,
    advertising: bool,
}

impl BlePeripheral {
    /// Open the adapter. Connection and write events are delivered to `events`.
    pub async fn new(events: mpsc::Sender<RadioEvent>) -> Result<Self, Error> {
        let (evt_tx, evt_rx) = mpsc::channel::<PeripheralEvent>(256);
        let peripheral = Peripheral::new(evt_tx)
            .await
            .map_err(|e| Error::Unavailable(e.into()))?;

        let attrs = SharedAttributes::default();
        tokio::spawn(event_task(evt_rx, events, attrs.clone()));

        Ok(Self {
            peripheral,
            attrs,
            uuids: HashMap::new(),
            service: None,
            published: false,
            advertising: false,
        })
    }

    fn uuid_of(&self, handle: CharHandle) -> Result<Uuid, Error> {
        self.uuids
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::registration(format!("unknown characteristic handle {handle:?}")))
    }

    async fn publish(&mut self) -> Result<(), Error> {
        let Some(def) = &self.service else {
            return Err(Error::registration("no service registered"));
        };

        let service = {
            let attrs = lock(&self.attrs);
            Service {
                uuid: Uuid::from_short(def.uuid),
                primary: true,
                characteristics: def
                    .characteristics
                    .iter()
                    .map(|c| {
                        let uuid = Uuid::from_short(c.uuid);
                        let (properties, permissions) = gatt_properties(c.flags);
                        // read-only values never change after startup, let the stack serve them
                        let value = (c.flags == CharFlags::READ)
                            .then(|| attrs.values.get(&uuid).cloned())
                            .flatten();
                        Characteristic {
                            uuid,
                            properties,
                            permissions,
                            value,
                            ..Default::default()
                        }
                    })
                    .collect(),
            }
        };

        self.peripheral
            .add_service(&service)
            .await
            .map_err(|e| Error::Registration(e.into()))?;
        self.published = true;
        tracing::info!(uuid = %service.uuid, "GATT service published");
        Ok(())
    }
}

fn gatt_properties(flags: CharFlags) -> (Vec<CharacteristicProperty>, Vec<AttributePermission>) {
    let mut properties = Vec::new();
    let mut permissions = Vec::new();
    if flags.contains(CharFlags::READ) {
        properties.push(CharacteristicProperty::Read);
        permissions.push(AttributePermission::Readable);
    }
    if flags.contains(CharFlags::WRITE) {
        properties.push(CharacteristicProperty::Write);
        permissions.push(AttributePermission::Writeable);
    }
    if flags.contains(CharFlags::NOTIFY) {
        properties.push(CharacteristicProperty::Notify);
    }
    (properties, permissions)
}

impl RadioStack for BlePeripheral {
    async fn activate(&mut self) -> Result<(), Error> {
        // Backoff until powered
        let mut delay_ms = 50u64;
        loop {
            let powered = self
                .peripheral
                .is_powered()
                .await
                .map_err(|e| Error::Unavailable(e.into()))?;
            if powered {
                break;
            }
            tracing::debug!(%delay_ms, "Adapter not powered yet");
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            delay_ms = (delay_ms * 2).min(1000);
        }
        tracing::info!("Adapter powered");
        Ok(())
    }

    async fn register_gatt_service(&mut self, service: &ServiceDef) -> Result<Vec<CharHandle>, Error> {
        if self.service.is_some() {
            return Err(Error::registration("a service is already registered"));
        }

        let mut attrs = lock(&self.attrs);
        let handles: Vec<CharHandle> = service
            .characteristics
            .iter()
            .zip(1u16..)
            .map(|(c, n)| {
                let handle = CharHandle(n);
                let uuid = Uuid::from_short(c.uuid);
                self.uuids.insert(handle, uuid);
                attrs.handles.insert(uuid, handle);
                attrs.flags.insert(uuid, c.flags);
                handle
            })
            .collect();
        drop(attrs);

        self.service = Some(service.clone());
        tracing::debug!(service = %format!("{:#06x}", service.uuid), count = handles.len(), "Registered service");
        Ok(handles)
    }

    async fn write_characteristic(&mut self, handle: CharHandle, value: &[u8]) -> Result<(), Error> {
        let uuid = self.uuid_of(handle)?;
        lock(&self.attrs).values.insert(uuid, value.to_vec());
        Ok(())
    }

    async fn notify_characteristic(
        &mut self,
        conn: ConnHandle,
        handle: CharHandle,
        value: &[u8],
    ) -> Result<(), Error> {
        let uuid = self.uuid_of(handle)?;
        lock(&self.attrs).values.insert(uuid, value.to_vec());
        tracing::trace!(%conn, ?value, "Notify");
        self.peripheral
            .update_characteristic(uuid, value.to_vec().into())
            .await
            .map_err(|e| Error::Notify(e.into()))
    }

    async fn advertise(&mut self, interval_us: u32, payload: &[u8]) -> Result<(), Error> {
        if !self.published {
            self.publish().await?;
        }

        if self.advertising {
            if let Err(e) = self.peripheral.stop_advertising().await {
                tracing::warn!(error = %format!("{e:#}"), "advertise stop error");
            }
            self.advertising = false;
        }

        let fields = AdvFields::parse(payload);
        let name = fields.name.unwrap_or_default();
        let uuids: Vec<Uuid> = fields.uuids16.iter().map(|&u| Uuid::from_short(u)).collect();
        // The stack picks its own interval.
        tracing::debug!(%interval_us, len = payload.len(), "Advertising payload");

        self.peripheral
            .start_advertising(&name, &uuids, fields.appearance)
            .await
            .map_err(|e| Error::Advertise(e.into()))?;
        self.advertising = true;
        tracing::info!("Advertising {}", &name);
        Ok(())
    }
}

/// Serve reads and writes from the value store and turn Input Report
/// subscriptions into connection events.
async fn event_task(
    mut evt_rx: mpsc::Receiver<PeripheralEvent>,
    events: mpsc::Sender<RadioEvent>,
    attrs: SharedAttributes,
) {
    let input_uuid = Uuid::from_short(crate::consts::UUID_HID_REPORT);
    let mut current: Option<String> = None;
    let mut next_conn: u16 = 1;

    while let Some(ev) = evt_rx.recv().await {
        let forward = match ev {
            PeripheralEvent::StateUpdate { is_powered } => {
                tracing::info!(%is_powered, "Adapter powered");
                None
            }
            PeripheralEvent::CharacteristicSubscriptionUpdate { request, subscribed } => {
                if request.characteristic != input_uuid {
                    tracing::debug!(%subscribed, ?request, "Other subscription");
                    None
                } else if subscribed {
                    let handle = ConnHandle(next_conn);
                    next_conn = next_conn.checked_add(1).unwrap_or(1);
                    current = Some(request.client);
                    Some(RadioEvent::Connect(handle))
                } else if current.as_deref() == Some(request.client.as_str()) {
                    current = None;
                    Some(RadioEvent::Disconnect)
                } else {
                    tracing::debug!(client = %request.client, "Unsubscribe from stale client");
                    None
                }
            }
            PeripheralEvent::ReadRequest { request, offset, responder } => {
                tracing::debug!(?request, %offset, "ReadRequest");
                let value = lock(&attrs).values.get(&request.characteristic).cloned().unwrap_or_default();
                let offset = offset as usize;
                let reply = if offset > value.len() {
                    ReadRequestResponse {
                        value: Vec::<u8>::new().into(),
                        response: RequestResponse::InvalidOffset,
                    }
                } else {
                    ReadRequestResponse {
                        value: value[offset..].to_vec().into(),
                        response: RequestResponse::Success,
                    }
                };
                let _ = responder.send(reply);
                None
            }
            PeripheralEvent::WriteRequest { request, offset, value, responder } => {
                tracing::debug!(?request, %offset, ?value, "WriteRequest");
                let (response, forward) = {
                    let mut attrs = lock(&attrs);
                    let writable = attrs
                        .flags
                        .get(&request.characteristic)
                        .is_some_and(|f| f.contains(CharFlags::WRITE));
                    match attrs.handles.get(&request.characteristic).copied() {
                        Some(handle) if writable => {
                            let stored = attrs.values.entry(request.characteristic).or_default();
                            patch(stored, offset as usize, &value);
                            let full = stored.clone();
                            (RequestResponse::Success, Some(RadioEvent::Write { handle, value: full }))
                        }
                        Some(_) => (RequestResponse::RequestNotSupported, None),
                        None => (RequestResponse::InvalidHandle, None),
                    }
                };
                let _ = responder.send(WriteRequestResponse { response });
                forward
            }
        };

        if let Some(ev) = forward {
            if events.send(ev).await.is_err() {
                break;
            }
        }
    }
    tracing::debug!("Peripheral event task finished");
}

fn patch(stored: &mut Vec<u8>, offset: usize, value: &[u8]) {
    if offset == 0 {
        stored.clear();
    }
    let end = offset + value.len();
    if stored.len() < end {
        stored.resize(end, 0);
    }
    stored[offset..end].copy_from_slice(value);
}
