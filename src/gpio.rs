/// Digital output used for the touch indicator.
pub trait Gpio {
    fn set_output(&mut self, pin: u8, on: bool);
}

/// Host stand-in for the indicator LED: state changes go to the log.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
}

impl LogIndicator {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Gpio for LogIndicator {
    fn set_output(&mut self, pin: u8, on: bool) {
        if self.lit != on {
            tracing::debug!(%pin, %on, "Indicator");
        }
        self.lit = on;
    }
}
