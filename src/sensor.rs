//! Touch sensor sources. Readings follow capacitive discharge semantics:
//! lower means more contact.

use std::collections::VecDeque;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::error::Error;

/// Reading reported when nothing is touching the pad.
pub const IDLE_READING: u16 = u16::MAX;

pub trait TouchSensor {
    fn read(&mut self) -> Result<u16, Error>;
}

impl<T: TouchSensor + ?Sized> TouchSensor for Box<T> {
    fn read(&mut self) -> Result<u16, Error> {
        (**self).read()
    }
}

/// Fixed sequence of readings, one per call, then idle forever.
#[derive(Debug, Clone, Default)]
pub struct ReplaySensor {
    readings: VecDeque<u16>,
}

impl ReplaySensor {
    pub fn new(readings: impl IntoIterator<Item = u16>) -> Self {
        Self { readings: readings.into_iter().collect() }
    }

    /// Whitespace or comma separated integers.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(parse_readings(&text)?))
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.readings.len()
    }
}

impl TouchSensor for ReplaySensor {
    fn read(&mut self) -> Result<u16, Error> {
        Ok(self.readings.pop_front().unwrap_or(IDLE_READING))
    }
}

pub fn parse_readings(text: &str) -> Result<Vec<u16>, Error> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>().map_err(|e| {
                Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad reading {s:?}: {e}"),
                ))
            })
        })
        .collect()
}

/// Live readings from standard input, one integer per line. `read` returns
/// the most recent value without waiting for a new one.
pub struct StdinSensor {
    rx: watch::Receiver<u16>,
}

impl StdinSensor {
    /// Spawns the line reader on the current runtime.
    pub fn spawn(pin: u8) -> Self {
        let (tx, rx) = watch::channel(IDLE_READING);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            tracing::info!(%pin, "Reading touch values from stdin");
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match line.trim().parse::<u16>() {
                        Ok(v) => {
                            if tx.send(v).is_err() {
                                break;
                            }
                        }
                        Err(_) if line.trim().is_empty() => {}
                        Err(e) => tracing::warn!(%line, error = %e, "Unparseable reading"),
                    },
                    Ok(None) => {
                        tracing::info!("stdin closed, holding last reading");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "stdin read error");
                        break;
                    }
                }
            }
        });
        Self { rx }
    }
}

impl TouchSensor for StdinSensor {
    fn read(&mut self) -> Result<u16, Error> {
        Ok(*self.rx.borrow_and_update())
    }
}
