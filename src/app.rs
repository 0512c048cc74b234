use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::Error;
use crate::gpio::Gpio;
use crate::hid::HidKeyboard;
use crate::radio::{RadioEvent, RadioStack};
use crate::sensor::TouchSensor;
use crate::touch::TouchSampler;

/// Main control loop: sample the pad on every tick and apply radio events
/// as they arrive. Transient faults are logged and followed by `backoff`;
/// anything else ends the loop. A failed re-advertise is retried on the
/// next tick after the backoff. Returns once the event channel closes.
pub async fn run<R, S, G>(
    keyboard: &mut HidKeyboard<R>,
    sampler: &mut TouchSampler<S, G>,
    events: &mut mpsc::Receiver<RadioEvent>,
) -> Result<(), Error>
where
    R: RadioStack,
    S: TouchSensor,
    G: Gpio,
{
    let backoff = sampler.config().error_backoff;
    let mut ticker = tokio::time::interval(sampler.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let res = tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => {
                    tracing::trace!(?ev, "Radio event");
                    keyboard.handle_event(ev).await
                }
                None => break,
            },
            _ = ticker.tick() => match keyboard.retry_advertise().await {
                Ok(()) => sampler.poll(keyboard).await.map(|_| ()),
                Err(e) => Err(e),
            },
        };
        if let Err(e) = res {
            recover(e, backoff).await?;
        }
    }

    tracing::info!("Radio event channel closed");
    Ok(())
}

async fn recover(e: Error, backoff: Duration) -> Result<(), Error> {
    if !e.is_transient() {
        return Err(e);
    }
    tracing::error!(error = %e, backoff_ms = backoff.as_millis() as u64, "Transient fault");
    tokio::time::sleep(backoff).await;
    Ok(())
}
