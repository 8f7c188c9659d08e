#![no_std]
#![no_main]

use core::cell::RefCell;

use panic_halt as _;
use rp_pico::entry;
use rp_pico::hal; // Hardware Abstraction Layer (higher-level drivers)
use rp_pico::hal::pac; // Peripheral Access Crate (low-level register access)
use rp_pico::hal::adc::AdcPin;
use rp_pico::hal::gpio::bank0::{Gpio0, Gpio1};
use rp_pico::hal::gpio::{DynPinId, FunctionSioOutput, FunctionUart, Pin, PullDown};
use rp_pico::hal::pac::interrupt;
use rp_pico::hal::pwm::{FreeRunning, Pwm0, Slice, Slices};
use rp_pico::hal::timer::{Alarm, Alarm0};
use rp_pico::hal::uart::{DataBits, Reader, StopBits, UartConfig, UartPeripheral};
use rp_pico::hal::Clock;

use cortex_m::interrupt::Mutex;
use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use embedded_hal::pwm::SetDutyCycle;
use fugit::{MicrosDurationU32, RateExtU32};
use portable_atomic::{AtomicBool, Ordering};

use matrix_snake::bitfield::extract_bits;
use matrix_snake::brightness::BrightnessControl;
use matrix_snake::game::SnakeGame;
use matrix_snake::input;
use matrix_snake::liveness::{LivenessRegister, Task};
use matrix_snake::scan::{PixelDrive, ScanDriver, ROW_LO};
use matrix_snake::status;

/// Period of the matrix scan: one cell per tick, 64 ticks per frame.
const SCAN_TICK: MicrosDurationU32 = MicrosDurationU32::micros(320);

/// Hardware watchdog window. The liveness protocol has to reach a full
/// rendezvous at least this often or the chip reboots.
const WATCHDOG_WINDOW: MicrosDurationU32 = MicrosDurationU32::millis(500);

type UartPins = (
    Pin<Gpio0, FunctionUart, PullDown>,
    Pin<Gpio1, FunctionUart, PullDown>,
);
type SelectPin = Pin<DynPinId, FunctionSioOutput, PullDown>;

/// The six select lines feeding the row and column decoders. Pin `i`
/// carries bit `i + ROW_LO` of the packed select word, so the wiring
/// mirrors the word layout directly.
struct LineDriver {
    select: [SelectPin; 6],
}

impl LineDriver {
    fn apply(&mut self, word: u8) {
        for (i, pin) in self.select.iter_mut().enumerate() {
            let bit = i as u8 + ROW_LO;
            if extract_bits(word, bit, bit) != 0 {
                pin.set_high().ok();
            } else {
                pin.set_low().ok();
            }
        }
    }
}

/// State shared between the interrupt handlers and the main loop. Accessed
/// only inside `interrupt::free` critical sections; the game is mutated by
/// the timer handler alone, the pending direction by the UART handler, and
/// the main loop limits itself to reading the score/brightness and toggling
/// the pause flag.
struct Shared {
    alarm0: Alarm0,
    game: SnakeGame,
    scanner: ScanDriver,
    brightness: BrightnessControl,
    line_driver: LineDriver,
    pwm: Slice<Pwm0, FreeRunning>,
    uart_rx: Reader<pac::UART0, UartPins>,
}

static SHARED: Mutex<RefCell<Option<Shared>>> = Mutex::new(RefCell::new(None));
static LIVENESS: LivenessRegister = LivenessRegister::new();
static RESTART_REQUEST: AtomicBool = AtomicBool::new(false);

fn with_shared<F>(f: F)
where
    F: FnOnce(&mut Shared),
{
    cortex_m::interrupt::free(|cs| {
        if let Some(shared) = SHARED.borrow(cs).borrow_mut().as_mut() {
            f(shared);
        }
    });
}

#[entry]
fn main() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();

    // Reset cause has to be sampled before the watchdog peripheral is
    // claimed for clock setup.
    let watchdog_fired = pac.WATCHDOG.reason().read().timer().bit_is_set();

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // Configure the clocks (125 MHz system clock)
    let clocks = hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let sio = hal::Sio::new(pac.SIO); // single-cycle IO
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    // Serial link for the directional commands and the status readout.
    let uart_pins: UartPins = (pins.gpio0.into_function(), pins.gpio1.into_function());
    let mut uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            UartConfig::new(115_200.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        )
        .unwrap();
    uart.enable_rx_interrupt();
    let (uart_rx, mut uart_tx) = uart.split();

    // A watchdog timeout means some task stopped making progress. Report it
    // and halt without re-arming the watchdog; only an external reset (or a
    // power cycle) leaves this state.
    if watchdog_fired {
        uart_tx.write_full_blocking(b"Watchdog\r\nError\r\n");
        loop {
            cortex_m::asm::wfi();
        }
    }

    // PWM drives the decoder enables; its duty is the pixel intensity.
    let pwm_slices = Slices::new(pac.PWM, &mut pac.RESETS);
    let mut pwm = pwm_slices.pwm0;
    pwm.set_ph_correct();
    pwm.enable();
    pwm.channel_a.output_to(pins.gpio16);
    pwm.channel_a.set_duty_cycle_fully_off().ok();

    // Photodiode on the ADC, free-running at ~1 kS/s, one interrupt per
    // conversion. The FIFO handle stays alive on this stack frame; the
    // handler reads the FIFO registers directly.
    let mut adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let mut light_sensor = AdcPin::new(pins.gpio26.into_floating_input()).unwrap();
    let _adc_fifo = adc
        .build_fifo()
        .clock_divider(47_999, 0)
        .set_channel(&mut light_sensor)
        .shift_8bit()
        .enable_interrupt(1)
        .start();

    let line_driver = LineDriver {
        select: [
            pins.gpio2.into_push_pull_output().into_dyn_pin(),
            pins.gpio3.into_push_pull_output().into_dyn_pin(),
            pins.gpio4.into_push_pull_output().into_dyn_pin(),
            pins.gpio5.into_push_pull_output().into_dyn_pin(),
            pins.gpio6.into_push_pull_output().into_dyn_pin(),
            pins.gpio7.into_push_pull_output().into_dyn_pin(),
        ],
    };

    // Pause and restart buttons, momentary, active low.
    let mut pause_button = pins.gpio14.into_pull_up_input();
    let mut reset_button = pins.gpio15.into_pull_up_input();

    let mut led_pin = pins.led.into_push_pull_output();
    led_pin.set_high().unwrap();

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let mut alarm0 = timer.alarm_0().unwrap();
    alarm0.schedule(SCAN_TICK).unwrap();
    alarm0.enable_interrupt();

    cortex_m::interrupt::free(|cs| {
        SHARED.borrow(cs).replace(Some(Shared {
            alarm0,
            game: SnakeGame::new(),
            scanner: ScanDriver::new(),
            brightness: BrightnessControl::new(),
            line_driver,
            pwm,
            uart_rx,
        }));
    });

    unsafe {
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
        pac::NVIC::unmask(pac::Interrupt::UART0_IRQ);
        pac::NVIC::unmask(pac::Interrupt::ADC_IRQ_FIFO);
    }

    watchdog.start(WATCHDOG_WINDOW);

    let mut pause_pressed_last = false;
    let mut reset_pressed_last = false;

    loop {
        // Single-sample edge latch on each button: act on the falling edge
        // only, no further debouncing.
        let pause_pressed = pause_button.is_low().unwrap_or(false);
        if pause_pressed && !pause_pressed_last {
            with_shared(|shared| shared.game.toggle_paused());
        }
        pause_pressed_last = pause_pressed;

        let reset_pressed = reset_button.is_low().unwrap_or(false);
        if reset_pressed && !reset_pressed_last {
            RESTART_REQUEST.store(true, Ordering::Release);
        }
        reset_pressed_last = reset_pressed;

        // Multi-byte reads of interrupt-owned state happen inside the
        // critical section; the blocking UART writes happen outside it.
        let mut score = 0u16;
        let mut raw = 0u8;
        with_shared(|shared| {
            score = shared.game.score();
            raw = shared.brightness.raw();
        });
        uart_tx.write_full_blocking(status::score_line(score).as_bytes());
        uart_tx.write_full_blocking(b"\r\n");
        uart_tx.write_full_blocking(status::brightness_line(raw).as_bytes());
        uart_tx.write_full_blocking(b"\r\n");

        // The main loop is itself one of the three tasks it is checking:
        // mark first, then drain, and only a full rendezvous feeds the
        // watchdog.
        LIVENESS.mark_alive(Task::MainLoop);
        if LIVENESS.try_drain() {
            watchdog.feed();
            led_pin.toggle().ok();
        }
    }
}

#[interrupt]
fn TIMER_IRQ_0() {
    with_shared(|shared| {
        shared.alarm0.schedule(SCAN_TICK).ok();
        shared.alarm0.clear_interrupt();

        let restart = RESTART_REQUEST.load(Ordering::Acquire);
        let tick = shared.scanner.tick(&mut shared.game, restart);
        if tick.restart_consumed {
            RESTART_REQUEST.store(false, Ordering::Release);
        }

        shared.line_driver.apply(tick.select);
        match tick.pixel {
            PixelDrive::Off => {
                shared.pwm.channel_a.set_duty_cycle_fully_off().ok();
            }
            PixelDrive::On => {
                // Restart the dimming period so switching cells does not
                // clip it into visible flicker.
                shared.pwm.set_counter(0);
                shared
                    .pwm
                    .channel_a
                    .set_duty_cycle_fraction(shared.brightness.duty() as u16, u8::MAX as u16)
                    .ok();
            }
        }

    });
    LIVENESS.mark_alive(Task::PeriodicTask);
}

#[interrupt]
fn UART0_IRQ() {
    with_shared(|shared| {
        let mut buf = [0u8; 16];
        if let Ok(count) = shared.uart_rx.read_raw(&mut buf) {
            for &byte in &buf[..count] {
                if let Some(dir) = input::decode(byte) {
                    shared.game.set_pending_direction(dir);
                }
            }
        }
    });
}

#[interrupt]
fn ADC_IRQ_FIFO() {
    // Drain every pending conversion; the interrupt stays asserted while
    // the FIFO level is at or above the configured threshold.
    let adc = unsafe { &*pac::ADC::ptr() };
    while adc.fcs().read().level().bits() > 0 {
        let raw = adc.fifo().read().val().bits() as u8;
        with_shared(|shared| {
            // The new duty takes effect on the next lit cell; writing the
            // PWM here could light a cell the scan has just blanked.
            shared.brightness.on_sample(raw);
        });
    }
    LIVENESS.mark_alive(Task::SampleTask);
}
