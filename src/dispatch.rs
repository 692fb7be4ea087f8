use embedded_hal::digital::v2::OutputPin;

use crate::button::Press;
use crate::led::{Led, Mode};

/// Blink periods a long press steps through.
pub const BLINK_PERIODS_MS: [u32; 4] = [100, 500, 1000, 2000];

/// Maps presses to LED actions: short toggles, double starts blinking, long picks the next
/// blink period.
#[derive(Default)]
pub struct Dispatcher {
    next_period: usize,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Dispatcher { next_period: 0 }
    }

    pub fn handle<PIN: OutputPin>(&mut self, press: Press, led: &mut Led<PIN>) {
        match press {
            Press::Short => led.toggle(),
            Press::Long => {
                led.set_blink_period(BLINK_PERIODS_MS[self.next_period]);
                self.next_period = (self.next_period + 1) % BLINK_PERIODS_MS.len();
            }
            Press::Double => led.set_mode(Mode::Blinking),
        }
    }
}
