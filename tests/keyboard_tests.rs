mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;

use common::{Call, MockRadio};
use touchkey::consts::*;
use touchkey::gpio::LogIndicator;
use touchkey::hid::{HID_REPORT_DESCRIPTOR, HidKeyboard, KeyboardConfig, hid_service_def};
use touchkey::radio::{ConnHandle, RadioEvent};
use touchkey::sensor::ReplaySensor;
use touchkey::touch::{TouchConfig, TouchSampler};
use touchkey::{adv, app};

async fn keyboard() -> HidKeyboard<MockRadio> {
    keyboard_with(MockRadio::default()).await
}

async fn keyboard_with(radio: MockRadio) -> HidKeyboard<MockRadio> {
    HidKeyboard::new(radio, KeyboardConfig::default()).await.expect("keyboard starts")
}

/// The advertise issued for the first disconnect fails.
fn radio_failing_readvertise() -> MockRadio {
    MockRadio { fail_advertise_nth: Some(2), ..Default::default() }
}

#[tokio::test(start_paused = true)]
async fn startup_registers_writes_and_advertises() {
    let kb = keyboard().await;
    let radio = kb.radio();

    assert_eq!(radio.calls[0], Call::Activate);
    assert_eq!(radio.calls[1], Call::Register(hid_service_def()));

    let h = kb.handles();
    assert_eq!(radio.values[&h.info], vec![0x11, 0x01, 0x00, 0x02]);
    assert_eq!(radio.values[&h.report_map], HID_REPORT_DESCRIPTOR.to_vec());
    assert_eq!(radio.values[&h.input], vec![0u8; 8]);
    assert_eq!(radio.values[&h.protocol_mode], vec![0x01]);
    assert_eq!(radio.values[&h.control_point], vec![0x00]);

    let expected = adv::build("ESP Space", APPEARANCE_KEYBOARD, false, false);
    assert_eq!(radio.advertisements(), vec![expected.clone()]);
    assert_eq!(kb.advertising_payload(), expected.as_slice());
    assert!(matches!(
        radio.calls.last(),
        Some(Call::Advertise { interval_us: 500_000, .. })
    ));
    assert!(!kb.is_connected());
}

#[tokio::test(start_paused = true)]
async fn registration_failure_is_fatal() {
    let radio = MockRadio { fail_register: true, ..Default::default() };
    let err = HidKeyboard::new(radio, KeyboardConfig::default()).await.err().expect("must fail");
    assert!(!err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn send_key_without_connection_is_dropped() {
    let mut kb = keyboard().await;
    assert!(!kb.send_key(KEY_SPACE).await.unwrap());
    assert!(!kb.send_key(KEY_SPACE).await.unwrap());
    assert!(kb.radio().notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_key_notifies_press_then_release_after_hold() {
    let mut kb = keyboard().await;
    kb.handle_event(RadioEvent::Connect(ConnHandle(7))).await.unwrap();

    assert!(kb.send_key(KEY_SPACE).await.unwrap());

    let n = kb.radio().notifications();
    assert_eq!(n.len(), 2);
    let input = kb.handles().input;
    assert_eq!((n[0].0, n[0].1), (ConnHandle(7), input));
    assert_eq!(n[0].2, vec![0, 0, 0x2C, 0, 0, 0, 0, 0]);
    assert_eq!((n[1].0, n[1].1), (ConnHandle(7), input));
    assert_eq!(n[1].2, vec![0u8; 8]);
    assert!(n[1].3 - n[0].3 >= Duration::from_millis(75));
}

#[tokio::test(start_paused = true)]
async fn disconnect_readvertises_same_payload() {
    let mut kb = keyboard().await;
    kb.handle_event(RadioEvent::Connect(ConnHandle(1))).await.unwrap();
    kb.handle_event(RadioEvent::Disconnect).await.unwrap();

    assert!(!kb.is_connected());
    let ads = kb.radio().advertisements();
    assert_eq!(ads.len(), 2);
    assert_eq!(ads[0], ads[1]);

    // no live connection, nothing to re-advertise for
    kb.handle_event(RadioEvent::Disconnect).await.unwrap();
    assert_eq!(kb.radio().advertisements().len(), 2);

    kb.handle_event(RadioEvent::Connect(ConnHandle(2))).await.unwrap();
    assert_eq!(kb.connection(), Some(ConnHandle(2)));
}

#[tokio::test(start_paused = true)]
async fn boot_protocol_request_keeps_report_layout() {
    let mut kb = keyboard().await;
    let pm = kb.handles().protocol_mode;
    let cp = kb.handles().control_point;
    kb.handle_event(RadioEvent::Connect(ConnHandle(5))).await.unwrap();

    for value in [vec![PROTOCOL_MODE_BOOT], vec![0x07], vec![]] {
        kb.handle_event(RadioEvent::Write { handle: pm, value }).await.unwrap();
    }
    kb.handle_event(RadioEvent::Write { handle: cp, value: vec![CONTROL_SUSPEND] }).await.unwrap();
    assert!(kb.is_connected());

    assert!(kb.send_key(KEY_SPACE).await.unwrap());
    let n = kb.radio().notifications();
    assert_eq!(n[0].2, vec![0, 0, 0x2C, 0, 0, 0, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn failed_readvertise_is_retried_until_it_succeeds() {
    let mut kb = keyboard_with(radio_failing_readvertise()).await;
    kb.handle_event(RadioEvent::Connect(ConnHandle(1))).await.unwrap();

    let err = kb.handle_event(RadioEvent::Disconnect).await.unwrap_err();
    assert!(err.is_transient());
    assert!(kb.needs_advertise());

    kb.retry_advertise().await.unwrap();
    assert!(!kb.needs_advertise());
    assert_eq!(kb.radio().advertisements().len(), 3);

    // nothing pending, nothing sent
    kb.retry_advertise().await.unwrap();
    assert_eq!(kb.radio().advertisements().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_loop_readvertises_after_backoff_and_accepts_new_host() {
    let mut kb = keyboard_with(radio_failing_readvertise()).await;
    kb.handle_event(RadioEvent::Connect(ConnHandle(1))).await.unwrap();

    let mut sampler = TouchSampler::new(
        ReplaySensor::default(),
        LogIndicator::default(),
        TouchConfig::default(),
    );
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(RadioEvent::Disconnect).await.unwrap();
    let reconnect = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        reconnect.send(RadioEvent::Connect(ConnHandle(2))).await.unwrap();
    });

    let res = tokio::time::timeout(Duration::from_secs(3), app::run(&mut kb, &mut sampler, &mut rx)).await;
    assert!(res.is_err(), "run keeps going after the advertise fault");

    let ads = kb.radio().advertisements();
    assert_eq!(ads.len(), 3);
    assert_eq!(ads[1], ads[2]);
    assert!(!kb.needs_advertise());
    assert_eq!(kb.connection(), Some(ConnHandle(2)));
}

#[tokio::test(start_paused = true)]
async fn failed_notify_surfaces_as_transient() {
    let radio = MockRadio { fail_notifies: 1, ..Default::default() };
    let mut kb = HidKeyboard::new(radio, KeyboardConfig::default()).await.unwrap();
    kb.handle_event(RadioEvent::Connect(ConnHandle(3))).await.unwrap();

    let start = Instant::now();
    let err = kb.send_key(KEY_SPACE).await.unwrap_err();
    assert!(err.is_transient());
    // failed before the hold
    assert_eq!(Instant::now(), start);
    assert!(kb.radio().notifications().is_empty());
}
