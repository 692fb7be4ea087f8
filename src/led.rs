use embedded_hal::digital::v2::OutputPin;
use log::debug;

use crate::time::Millis;

pub const BLINK_PERIOD_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    On,
    Blinking,
}

impl Mode {
    pub fn from_u8(v: u8) -> Option<Mode> {
        match v {
            0 => Some(Mode::Off),
            1 => Some(Mode::On),
            2 => Some(Mode::Blinking),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Mode::Off => 0,
            Mode::On => 1,
            Mode::Blinking => 2,
        }
    }
}

/// LED with an off/on/blinking mode. Mode changes take effect on the next [`Led::tick`].
pub struct Led<PIN> {
    pin: PIN,
    mode: Mode,
    lit: bool,
    blink_period_ms: u32,
    last_switch: Millis,
}

impl<PIN> Led<PIN>
where
    PIN: OutputPin,
{
    pub fn new(mut pin: PIN) -> Result<Self, PIN::Error> {
        pin.set_low()?;

        Ok(Led {
            pin,
            mode: Mode::Off,
            lit: false,
            blink_period_ms: BLINK_PERIOD_MS,
            last_switch: Millis(0),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            debug!("LED mode {:?}", mode);
        }

        self.mode = mode;
    }

    pub fn toggle(&mut self) {
        match self.mode {
            Mode::On | Mode::Blinking => self.set_mode(Mode::Off),
            Mode::Off => self.set_mode(Mode::On),
        }
    }

    /// How long the LED stays in each state while blinking.
    pub fn set_blink_period(&mut self, ms: u32) {
        self.blink_period_ms = ms;
    }

    pub fn blink_period(&self) -> u32 {
        self.blink_period_ms
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn tick(&mut self, now: Millis) -> Result<(), PIN::Error> {
        match self.mode {
            Mode::Off => self.set_lit(false),
            Mode::On => self.set_lit(true),
            Mode::Blinking => {
                if now.since(self.last_switch) >= self.blink_period_ms {
                    self.set_lit(!self.lit)?;
                    self.last_switch = now;
                }

                Ok(())
            }
        }
    }

    fn set_lit(&mut self, lit: bool) -> Result<(), PIN::Error> {
        if lit == self.lit {
            return Ok(());
        }

        if lit {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }

        self.lit = lit;

        Ok(())
    }

    pub fn release(self) -> PIN {
        self.pin
    }
}
