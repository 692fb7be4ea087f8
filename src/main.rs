#![no_std]
#![no_main]

use panic_semihosting as _;
use rtfm::{app, Instant};
use stm32f1xx_hal::{
    gpio::{gpioa::*, gpiob::*, Input, Output, PullDown, PushPull},
    pac,
    prelude::*,
    serial::{self, Rx, Serial, Tx},
};

use btn_led::button::{Classifier, Config};
use btn_led::comm::{Comm, Command, Event, BAUD_RATE};
use btn_led::dispatch::Dispatcher;
use btn_led::led::{Led, Mode};
use btn_led::time::{Millis, MonotonicMs};

#[allow(unused)]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {
        cortex_m::interrupt::free(|_| {
            let itm = unsafe { &mut *cortex_m::peripheral::ITM::ptr() };
            cortex_m::iprintln!(&mut itm.stim[0], $($arg)*);
        });
    }
}

const SYSCLK_HZ: u32 = 8_000_000;
const MS: u32 = SYSCLK_HZ / 1000;

/// Button poll interval
const TICK_MS: u32 = 10;

struct ItmLogger;

impl log::Log for ItmLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        println!("{}: {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: ItmLogger = ItmLogger;

fn turnaround() {
    // two bit times, so the host has stopped driving the line
    cortex_m::asm::delay(2 * SYSCLK_HZ / BAUD_RATE);
}

#[app(device = stm32f1xx_hal::stm32)]
const APP: () = {
    static mut BTN: Classifier<PA4<Input<PullDown>>> = ();

    static mut LED: Led<PB0<Output<PushPull>>> = ();

    static mut COMM: Comm<Tx<pac::USART3>, Rx<pac::USART3>, PB1<Output<PushPull>>> = ();

    #[init(spawn = [tick])]
    fn init(c: init::Context) -> init::LateResources {
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Debug))
            .ok();

        let mut rcc = c.device.RCC.constrain();
        let mut flash = c.device.FLASH.constrain();
        let clocks = rcc.cfgr.use_hse(8.mhz()).freeze(&mut flash.acr);

        cortex_m::asm::delay(10 * MS);

        let mut afio = c.device.AFIO.constrain(&mut rcc.apb2);
        let mut gpioa = c.device.GPIOA.split(&mut rcc.apb2);
        let mut gpiob = c.device.GPIOB.split(&mut rcc.apb2);

        let serial_tx_pin = gpiob.pb10.into_alternate_push_pull(&mut gpiob.crh);
        let serial_rx_pin = gpiob.pb11;
        let serial_de_pin = gpiob.pb1.into_push_pull_output(&mut gpiob.crl);
        let btn_pin = gpioa.pa4.into_pull_down_input(&mut gpioa.crl);
        let led_pin = gpiob.pb0.into_push_pull_output(&mut gpiob.crl);

        let mut serial = Serial::usart3(
            c.device.USART3,
            (serial_tx_pin, serial_rx_pin),
            &mut afio.mapr,
            BAUD_RATE.bps(),
            clocks,
            &mut rcc.apb1,
        );

        serial.listen(serial::Event::Rxne);

        let (tx, rx) = serial.split();

        let comm = Comm::new(tx, rx, serial_de_pin, turnaround);

        let btn = Classifier::new(btn_pin, Config::default(), Millis(0)).unwrap();
        let led = Led::new(led_pin).unwrap();

        log::info!("started, {:?}", btn.config());

        c.spawn.tick().unwrap();

        init::LateResources {
            BTN: btn,
            LED: led,
            COMM: comm,
        }
    }

    #[task(resources = [BTN, LED, COMM], schedule = [tick], priority = 2)]
    fn tick(c: tick::Context) {
        static mut CLOCK: MonotonicMs = MonotonicMs::new(MS);
        static mut LAST: Option<Instant> = None;
        static mut DISPATCH: Dispatcher = Dispatcher::new();

        let btn = c.resources.BTN;
        let mut led = c.resources.LED;
        let mut comm = c.resources.COMM;

        // Measure real time, the task may start late behind USART3
        let started = Instant::now();
        let elapsed = LAST.map(|last| (started - last).as_cycles()).unwrap_or(0);
        *LAST = Some(started);

        let now = CLOCK.advance(elapsed);

        // A pin that can't be read leaves us with nothing to do
        if let Some(press) = btn.poll(now).unwrap() {
            let dispatch = &mut *DISPATCH;

            let (before, after) = led.lock(|led| {
                let before = led.mode();
                dispatch.handle(press, led);
                (before, led.mode())
            });

            comm.lock(|c| {
                c.send(Event::Press(press)).ok();

                if after != before {
                    c.send(Event::Mode(after)).ok();
                }
            });
        }

        led.lock(|led| led.tick(now)).ok();

        c.schedule.tick(c.scheduled + (TICK_MS * MS).cycles()).unwrap();
    }

    #[interrupt(resources = [COMM, LED], priority = 3)]
    fn USART3(c: USART3::Context) {
        let comm = c.resources.COMM;
        let led = c.resources.LED;

        if let Some(cmd) = comm.handle_rx() {
            match cmd {
                Command::Reset => {
                    comm.clear_events();
                    led.set_mode(Mode::Off);
                }
                Command::Mode(mode) => led.set_mode(mode),
                Command::BlinkPeriod(ms) => led.set_blink_period(ms as u32),
                Command::Ping => {}
            };

            comm.respond();
        }
    }

    extern "C" {
        fn USART1();
    }
};
