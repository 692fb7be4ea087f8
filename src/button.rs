use embedded_hal::digital::v2::InputPin;
use log::debug;

use crate::time::Millis;

pub const DEBOUNCE_MS: u32 = 50;
pub const LONG_PRESS_MS: u32 = 1000;
pub const DOUBLE_CLICK_MS: u32 = 300;

/// A classified button interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Short,
    Long,
    Double,
}

/// Which pin level counts as "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pull-down, idle low.
    ActiveHigh,
    /// Pull-up, idle high.
    ActiveLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Edges closer than this to the last accepted edge are treated as contact bounce. Must be
    /// below `i32::MAX`, deadlines are compared with wrapping arithmetic.
    pub debounce_ms: u32,
    /// A release at least this long after the press is a long press.
    pub long_press_ms: u32,
    /// How long after a short release a second press may start and still count as a double. A
    /// press landing exactly at the end of the window still counts.
    pub double_click_ms: u32,
    pub polarity: Polarity,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debounce_ms: DEBOUNCE_MS,
            long_press_ms: LONG_PRESS_MS,
            double_click_ms: DOUBLE_CLICK_MS,
            polarity: Polarity::ActiveHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No release can be accepted before the debounce window ends, so every press would be long.
    LongPressWithinDebounce,
    /// Debounce deadlines can't be told apart from past times across the wrap.
    DebounceTooLong,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms >= i32::MAX as u32 {
            return Err(ConfigError::DebounceTooLong);
        }

        if self.long_press_ms <= self.debounce_ms {
            return Err(ConfigError::LongPressWithinDebounce);
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    Pin(E),
    Config(ConfigError),
}

/// Multi-click disambiguation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickState {
    Idle,
    /// A short press was released and we're waiting to see if a second one follows.
    AwaitingSecondClick { released_at: Millis },
    /// The second press of a double click is down. Its release is a double no matter how long
    /// it was held.
    SecondClickHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Debounce {
    Settled,
    Bouncing { until: Millis },
}

/// Debounced button that tells short, long and double presses apart.
///
/// Never blocks: call [`Classifier::poll`] at a steady cadence well below the debounce time
/// (10-20 ms works) and act on whatever it returns. All decisions are made on the timestamps
/// passed in, not on how often it is called.
pub struct Classifier<PIN> {
    pin: PIN,
    config: Config,
    pressed: bool,
    debounce: Debounce,
    last_edge: Millis,
    click: ClickState,
}

impl<PIN> Classifier<PIN>
where
    PIN: InputPin,
{
    /// Takes the initial level from the pin, so a button that is already held at startup is
    /// measured from `now`.
    pub fn new(pin: PIN, config: Config, now: Millis) -> Result<Self, Error<PIN::Error>> {
        config.validate().map_err(Error::Config)?;

        let mut btn = Classifier {
            pin,
            config,
            pressed: false,
            debounce: Debounce::Settled,
            last_edge: now,
            click: ClickState::Idle,
        };

        btn.pressed = btn.read().map_err(Error::Pin)?;

        Ok(btn)
    }

    pub fn poll(&mut self, now: Millis) -> Result<Option<Press>, PIN::Error> {
        let pressed = self.read()?;

        if let Debounce::Bouncing { until } = self.debounce {
            if now.has_reached(until) {
                self.debounce = Debounce::Settled;
            }
        }

        let mut press = None;

        if self.debounce == Debounce::Settled && pressed != self.pressed {
            press = self.edge(pressed, now);
        }

        // An accepted press already left AwaitingSecondClick above, so this can't emit twice.
        if press.is_none() {
            press = self.check_click_window(now);
        }

        if let Some(press) = press {
            debug!("{:?} press", press);
        }

        Ok(press)
    }

    fn edge(&mut self, pressed: bool, now: Millis) -> Option<Press> {
        let held = now.since(self.last_edge);

        self.debounce = Debounce::Bouncing {
            until: now.add(self.config.debounce_ms),
        };
        self.pressed = pressed;
        self.last_edge = now;

        if pressed {
            if let ClickState::AwaitingSecondClick { .. } = self.click {
                self.click = ClickState::SecondClickHeld;
            }

            return None;
        }

        match self.click {
            ClickState::SecondClickHeld => {
                self.click = ClickState::Idle;
                Some(Press::Double)
            }
            _ if held >= self.config.long_press_ms => {
                self.click = ClickState::Idle;
                Some(Press::Long)
            }
            _ => {
                self.click = ClickState::AwaitingSecondClick { released_at: now };
                None
            }
        }
    }

    fn check_click_window(&mut self, now: Millis) -> Option<Press> {
        match self.click {
            ClickState::AwaitingSecondClick { released_at }
                if now.since(released_at) > self.config.double_click_ms =>
            {
                self.click = ClickState::Idle;
                Some(Press::Short)
            }
            _ => None,
        }
    }

    fn read(&self) -> Result<bool, PIN::Error> {
        let high = self.pin.is_high()?;

        Ok(match self.config.polarity {
            Polarity::ActiveHigh => high,
            Polarity::ActiveLow => !high,
        })
    }

    /// Debounced level as of the last accepted edge.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn click_state(&self) -> ClickState {
        self.click
    }

    pub fn is_debouncing(&self, now: Millis) -> bool {
        match self.debounce {
            Debounce::Bouncing { until } => !now.has_reached(until),
            Debounce::Settled => false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> PIN {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;

    struct TestPin<'a>(&'a Cell<bool>);

    impl InputPin for TestPin<'_> {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    struct BrokenPin;

    impl InputPin for BrokenPin {
        type Error = ();

        fn is_high(&self) -> Result<bool, ()> {
            Err(())
        }

        fn is_low(&self) -> Result<bool, ()> {
            Err(())
        }
    }

    /// Polls every 10 ms from 0 to `end`, applying the level changes in `script` as their time
    /// comes up, and collects what was emitted.
    fn run(config: Config, script: &[(u32, bool)], end: u32) -> Vec<(u32, Press)> {
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), config, Millis(0)).unwrap();
        let mut out = Vec::new();

        for t in (0..=end).step_by(10) {
            if let Some(&(_, l)) = script.iter().rev().find(|(at, _)| *at <= t) {
                level.set(l);
            }

            if let Some(press) = btn.poll(Millis(t)).unwrap() {
                out.push((t, press));
            }
        }

        out
    }

    #[test]
    fn short_press_fires_when_window_closes() {
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(0)).unwrap();

        level.set(true);
        assert_eq!(btn.poll(Millis(0)), Ok(None));
        level.set(false);
        assert_eq!(btn.poll(Millis(50)), Ok(None));
        assert_eq!(
            btn.click_state(),
            ClickState::AwaitingSecondClick { released_at: Millis(50) }
        );

        assert_eq!(btn.poll(Millis(349)), Ok(None));
        assert_eq!(btn.poll(Millis(350)), Ok(None));
        assert_eq!(btn.poll(Millis(351)), Ok(Some(Press::Short)));
        assert_eq!(btn.poll(Millis(360)), Ok(None));
        assert_eq!(btn.click_state(), ClickState::Idle);
    }

    #[test]
    fn short_press_is_emitted_once() {
        let out = run(Config::default(), &[(0, true), (50, false)], 3000);

        assert_eq!(out, [(360, Press::Short)]);
    }

    #[test]
    fn second_press_inside_window_is_double() {
        let out = run(
            Config::default(),
            &[(0, true), (50, false), (200, true), (260, false)],
            3000,
        );

        assert_eq!(out, [(260, Press::Double)]);
    }

    #[test]
    fn second_press_at_window_end_is_double() {
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(0)).unwrap();

        level.set(true);
        btn.poll(Millis(0)).unwrap();
        level.set(false);
        assert_eq!(btn.poll(Millis(50)), Ok(None));

        level.set(true);
        assert_eq!(btn.poll(Millis(350)), Ok(None));
        assert_eq!(btn.click_state(), ClickState::SecondClickHeld);

        level.set(false);
        assert_eq!(btn.poll(Millis(420)), Ok(Some(Press::Double)));
        assert_eq!(btn.poll(Millis(1000)), Ok(None));
    }

    #[test]
    fn double_ignores_second_hold_length() {
        let out = run(
            Config::default(),
            &[(0, true), (50, false), (200, true), (1500, false)],
            3000,
        );

        assert_eq!(out, [(1500, Press::Double)]);
    }

    #[test]
    fn long_press_fires_on_release() {
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(0)).unwrap();

        level.set(true);
        assert_eq!(btn.poll(Millis(0)), Ok(None));
        level.set(false);
        assert_eq!(btn.poll(Millis(1200)), Ok(Some(Press::Long)));
        assert_eq!(btn.click_state(), ClickState::Idle);

        for t in (1210..3000).step_by(10) {
            assert_eq!(btn.poll(Millis(t)), Ok(None));
        }
    }

    #[test]
    fn long_press_threshold_is_inclusive() {
        let out = run(Config::default(), &[(0, true), (1000, false)], 3000);
        assert_eq!(out, [(1000, Press::Long)]);

        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(0)).unwrap();

        level.set(true);
        btn.poll(Millis(0)).unwrap();
        level.set(false);
        assert_eq!(btn.poll(Millis(999)), Ok(None));
        assert_eq!(btn.poll(Millis(1299)), Ok(None));
        assert_eq!(btn.poll(Millis(1300)), Ok(Some(Press::Short)));
    }

    #[test]
    fn bounce_is_absorbed() {
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(0)).unwrap();

        level.set(true);
        btn.poll(Millis(0)).unwrap();

        for t in (5..50).step_by(5) {
            level.set(t % 10 != 5);
            assert_eq!(btn.poll(Millis(t)), Ok(None));
            assert!(btn.is_pressed());
            assert_eq!(btn.click_state(), ClickState::Idle);
            assert!(btn.is_debouncing(Millis(t)));
        }

        level.set(true);
        assert_eq!(btn.poll(Millis(50)), Ok(None));
        assert!(!btn.is_debouncing(Millis(50)));
        assert_eq!(btn.click_state(), ClickState::Idle);
    }

    #[test]
    fn bounce_after_release_is_not_a_second_click() {
        let out = run(
            Config::default(),
            &[
                (0, true),
                (10, false),
                (20, true),
                (30, false),
                (40, true),
                (300, false),
                (310, true),
                (320, false),
            ],
            1500,
        );

        assert_eq!(out, [(610, Press::Short)]);
    }

    #[test]
    fn click_window_runs_during_debounce() {
        let config = Config {
            debounce_ms: 500,
            ..Config::default()
        };
        let level = Cell::new(false);
        let mut btn = Classifier::new(TestPin(&level), config, Millis(0)).unwrap();

        level.set(true);
        btn.poll(Millis(0)).unwrap();
        level.set(false);
        assert_eq!(btn.poll(Millis(500)), Ok(None));

        assert_eq!(btn.poll(Millis(800)), Ok(None));
        assert!(btn.is_debouncing(Millis(801)));
        assert_eq!(btn.poll(Millis(801)), Ok(Some(Press::Short)));
    }

    #[test]
    fn replay_is_deterministic() {
        let script = [
            (0, true),
            (60, false),
            (100, true),
            (150, false),
            (700, true),
            (2000, false),
            (2500, true),
            (2560, false),
        ];

        let first = run(Config::default(), &script, 4000);
        let second = run(Config::default(), &script, 4000);

        assert_eq!(first, second);
        assert_eq!(
            first,
            [(160, Press::Double), (2000, Press::Long), (2870, Press::Short)]
        );
    }

    #[test]
    fn active_low_inverts_level() {
        let config = Config {
            polarity: Polarity::ActiveLow,
            ..Config::default()
        };
        let level = Cell::new(true);
        let mut btn = Classifier::new(TestPin(&level), config, Millis(0)).unwrap();

        assert!(!btn.is_pressed());

        level.set(false);
        btn.poll(Millis(10)).unwrap();
        assert!(btn.is_pressed());

        level.set(true);
        assert_eq!(btn.poll(Millis(1500)), Ok(Some(Press::Long)));
    }

    #[test]
    fn held_at_startup_is_timed_from_construction() {
        let level = Cell::new(true);
        let mut btn = Classifier::new(TestPin(&level), Config::default(), Millis(100)).unwrap();

        assert!(btn.is_pressed());

        level.set(false);
        assert_eq!(btn.poll(Millis(1100)), Ok(Some(Press::Long)));
    }

    #[test]
    fn pin_errors_propagate() {
        assert_eq!(
            Classifier::new(BrokenPin, Config::default(), Millis(0)).err(),
            Some(Error::Pin(()))
        );
    }

    #[test]
    fn rejects_long_press_inside_debounce() {
        let config = Config {
            debounce_ms: 50,
            long_press_ms: 50,
            ..Config::default()
        };
        let level = Cell::new(false);

        assert_eq!(
            Classifier::new(TestPin(&level), config, Millis(0)).err(),
            Some(Error::Config(ConfigError::LongPressWithinDebounce))
        );
    }

    #[test]
    fn rejects_debounce_past_wrap_range() {
        let config = Config {
            debounce_ms: i32::MAX as u32,
            long_press_ms: u32::MAX,
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::DebounceTooLong));

        let config = Config {
            debounce_ms: i32::MAX as u32 - 1,
            long_press_ms: u32::MAX,
            ..Config::default()
        };

        assert_eq!(config.validate(), Ok(()));
    }
}
