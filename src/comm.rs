use embedded_hal::{
    digital::v2::OutputPin,
    serial::{Read, Write},
};
use heapless::{consts::*, spsc::Queue, Vec};
use log::warn;
use nb::block;

use crate::button::Press;
use crate::led::Mode;

// Framing and escaping:
//
// '\n' = end of message
// '\\' 'n' = literal '\n'
// '\\' _ = literal _
//
// Command:
//
// 'P' = ping
// 'R' = reset (drop queued events, LED off)
// 'M' [0 | 1 | 2] = set LED mode (off, on, blinking)
// 'T' [u16 period in ms] = set blink period
//
// Event:
//
// 'p' = pong (no event)
// 's' = short press
// 'l' = long press
// 'd' = double press
// 'm' [0 | 1 | 2] = LED mode changed by a press

pub const BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Reset,
    Mode(Mode),
    BlinkPeriod(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Pong,
    Press(Press),
    Mode(Mode),
}

pub struct Comm<TX, RX, DE> {
    tx: TX,
    rx: RX,
    de: DE,
    turnaround: fn(),
    events: Queue<Event, U4>,
    rx_buf: Vec<u8, U16>,
    esc: bool,
}

trait ExtendEsc {
    fn extend_esc(&mut self, data: &[u8]) -> Result<(), u8>;
}

impl<N: heapless::ArrayLength<u8>> ExtendEsc for Vec<u8, N> {
    fn extend_esc(&mut self, data: &[u8]) -> Result<(), u8> {
        for b in data {
            match b {
                b'\n' => {
                    self.push(b'\\')?;
                    self.push(b'n')?;
                }
                b'\\' => {
                    self.push(b'\\')?;
                    self.push(b'\\')?;
                }
                b => {
                    self.push(*b)?;
                }
            }
        }

        Ok(())
    }
}

impl<TX, RX, DE> Comm<TX, RX, DE>
where
    TX: Write<u8>,
    RX: Read<u8>,
    DE: OutputPin,
{
    /// `turnaround` is called before driving the bus and should wait until the host has let go
    /// of the line.
    pub fn new(tx: TX, rx: RX, de: DE, turnaround: fn()) -> Self {
        Comm {
            tx,
            rx,
            de,
            turnaround,
            events: Queue::new(),
            rx_buf: Vec::new(),
            esc: false,
        }
    }

    /// Queues an event for the next response. Gives the event back if the queue is full.
    pub fn send(&mut self, ev: Event) -> Result<(), Event> {
        self.events.enqueue(ev).map_err(|ev| {
            warn!("event queue full, dropping {:?}", ev);
            ev
        })
    }

    pub fn clear_events(&mut self) {
        while self.events.dequeue().is_some() {}
    }

    /// Reads at most one byte. Returns a command once a full message has arrived; the caller
    /// must then act on it and call [`Comm::respond`].
    pub fn handle_rx(&mut self) -> Option<Command> {
        let b = self.rx.read().ok()?;

        if self.esc {
            let b = match b {
                b'n' => b'\n',
                _ => b,
            };

            self.rx_buf.push(b).ok();
            self.esc = false;
        } else {
            match b {
                b'\n' => return self.complete_read(),
                b'\\' => {
                    self.esc = true;
                }
                b => {
                    self.rx_buf.push(b).ok();
                }
            };
        }

        None
    }

    fn complete_read(&mut self) -> Option<Command> {
        if self.rx_buf.is_empty() {
            return None;
        }

        let cmd = match self.rx_buf[..] {
            [b'P'] => Some(Command::Ping),
            [b'R'] => Some(Command::Reset),
            [b'M', mode] => Mode::from_u8(mode).map(Command::Mode),
            [b'T', lo, hi] => Some(Command::BlinkPeriod(u16::from_le_bytes([lo, hi]))),
            _ => None,
        };

        if cmd.is_none() {
            self.respond();
        }

        cmd
    }

    pub fn respond(&mut self) {
        self.rx_buf.clear();

        let event = self.events.dequeue().unwrap_or(Event::Pong);

        let mut response = Vec::<u8, U8>::new();

        let res = match event {
            Event::Pong => response.push(b'p'),
            Event::Press(Press::Short) => response.push(b's'),
            Event::Press(Press::Long) => response.push(b'l'),
            Event::Press(Press::Double) => response.push(b'd'),
            Event::Mode(mode) => response
                .push(b'm')
                .and_then(|()| response.extend_esc(&[mode.as_u8()])),
        };

        res.and_then(|()| response.push(b'\n')).ok();

        (self.turnaround)();

        self.de.set_high().ok();

        for b in response {
            block!(self.tx.write(b)).ok();
        }

        block!(self.tx.flush()).ok();

        // The transceiver echoes what we sent, drop it
        self.rx.read().ok();

        self.de.set_low().ok();
    }

    pub fn release(self) -> (TX, RX, DE) {
        (self.tx, self.rx, self.de)
    }
}
