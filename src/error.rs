//! Crate error type.
//!
//! Faults split into two groups: transient I/O (sensor reads, notifications,
//! re-advertising) that the sampling loop logs and backs off from, and
//! startup faults that end the process.

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The touch sensor could not be read.
    #[error("touch sensor read failed: {0}")]
    Sensor(#[from] std::io::Error),

    /// A notification to the host failed, usually mid-disconnect.
    #[error("notify failed: {0}")]
    Notify(#[source] BoxError),

    /// The stack refused to (re)start advertising.
    #[error("advertising failed: {0}")]
    Advertise(#[source] BoxError),

    /// The GATT service could not be registered.
    #[error("GATT service registration failed: {0}")]
    Registration(#[source] BoxError),

    /// The radio adapter could not be brought up.
    #[error("radio unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl Error {
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Sensor(_) | Error::Notify(_) | Error::Advertise(_))
    }

    pub(crate) fn registration(msg: impl Into<String>) -> Self {
        Error::Registration(msg.into().into())
    }
}
