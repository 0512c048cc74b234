use crate::radio::ConnHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected(ConnHandle),
}

/// Tracks the single host connection the keyboard profile supports.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn handle(&self) -> Option<ConnHandle> {
        match self.state {
            ConnectionState::Connected(h) => Some(h),
            ConnectionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle().is_some()
    }

    /// A connect while already connected replaces the handle; the newest host wins.
    pub fn connect(&mut self, handle: ConnHandle) {
        if let ConnectionState::Connected(old) = self.state {
            tracing::warn!(%old, new = %handle, "Connect while connected; replacing handle");
        }
        self.state = ConnectionState::Connected(handle);
    }

    /// Returns true when a live connection ended.
    pub fn disconnect(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            ConnectionState::Connected(_) => true,
            ConnectionState::Disconnected => false,
        }
    }
}
