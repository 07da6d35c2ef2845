//! GPIO trigger line via the Linux character-device interface.

use gpiocdev::line::{Bias, Offset, Value};
use gpiocdev::Request;

use super::line::{LevelReader, LineError};
use crate::config::GpioBias;

/// Chips probed, in order, when the configured chip is `"auto"`.
/// The Raspberry Pi 5 exposes its header on `gpiochip4`; older boards use
/// `gpiochip0`.
const AUTO_CHIPS: &[&str] = &["/dev/gpiochip4", "/dev/gpiochip0"];

const CONSUMER: &str = "book-reader";

/// One requested input line. The request is released when this is dropped.
pub struct GpioLine {
    request: Request,
    offset: Offset,
    active_low: bool,
}

impl GpioLine {
    /// Request `offset` on `chip` as an input with the given bias.
    ///
    /// With `active_low` (pull-up wiring, button to ground) a reading of 0
    /// means pressed.
    pub fn open(
        chip: &str,
        offset: u32,
        active_low: bool,
        bias: GpioBias,
    ) -> Result<Self, LineError> {
        if chip == "auto" {
            let mut last = LineError::Unavailable("no GPIO chip found".into());
            for candidate in AUTO_CHIPS {
                match Self::open_on(candidate, offset, active_low, bias) {
                    Ok(line) => return Ok(line),
                    Err(e) => {
                        log::debug!("trigger: {candidate} unusable: {e}");
                        last = e;
                    }
                }
            }
            return Err(last);
        }
        Self::open_on(chip, offset, active_low, bias)
    }

    fn open_on(
        path: &str,
        offset: u32,
        active_low: bool,
        bias: GpioBias,
    ) -> Result<Self, LineError> {
        if !std::path::Path::new(path).exists() {
            return Err(LineError::Unavailable(format!("{path}: no such device")));
        }
        let request = Request::builder()
            .on_chip(path)
            .with_consumer(CONSUMER)
            .with_line(offset)
            .as_input()
            .with_bias(line_bias(bias))
            .request()
            .map_err(|e| LineError::Unavailable(format!("{path} line {offset}: {e}")))?;

        log::info!(
            "trigger: GPIO line {offset} on {path} ({}, bias {bias:?})",
            if active_low { "active-low" } else { "active-high" }
        );
        Ok(Self {
            request,
            offset,
            active_low,
        })
    }
}

/// `None` keeps the line's current bias.
fn line_bias(bias: GpioBias) -> Option<Bias> {
    match bias {
        GpioBias::PullUp => Some(Bias::PullUp),
        GpioBias::PullDown => Some(Bias::PullDown),
        GpioBias::Disabled => Some(Bias::Disabled),
        GpioBias::AsIs => None,
    }
}

impl LevelReader for GpioLine {
    fn is_asserted(&mut self) -> Result<bool, LineError> {
        let value = self
            .request
            .value(self.offset)
            .map_err(|e| LineError::Read(e.to_string()))?;
        Ok((value == Value::Active) != self.active_low)
    }

    fn backend(&self) -> &'static str {
        "gpio"
    }
}
