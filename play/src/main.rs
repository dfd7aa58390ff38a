mod config;

use crate::config::{Backend, PlayConfig, ScrollMode};
use dotenv::dotenv;
use eyre::eyre;
use hd44780_lcd::backlight::{AutoDim, DeadlineScheduler};
use hd44780_lcd::delay::SpinDelay;
use hd44780_lcd::driver::{BusWidth, HD44780Driver, Hd44780};
use hd44780_lcd::gpio::GpioDriver;
use hd44780_lcd::gpiod::GpiodDriver;
use hd44780_lcd::interface::LcdInterface;
use hd44780_lcd::interface::GpioLcdInterface;
use hd44780_lcd::sim::{SimClock, SimDelay, SimulatedLcd};
use hd44780_lcd::text::{Layout, RedrawScroll, ScrollStrategy, ShiftScroll, TextDisplay};
use log::{debug, info, warn};
use std::io::Read;
use std::thread::sleep;
use std::time::{Duration, Instant};
use sysinfo::System;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    /// Welcome text and how long it took to write.
    Hello,
    /// Everything from stdin.
    Dump,
    /// All 256 character codes.
    Font,
}

impl Mode {
    fn from_arg(arg: Option<&str>) -> eyre::Result<Self> {
        match arg {
            None | Some("hello") => Ok(Mode::Hello),
            Some("dump") => Ok(Mode::Dump),
            Some("font") => Ok(Mode::Font),
            Some(other) => Err(eyre!("Unknown mode {:?}, expected hello, dump or font", other)),
        }
    }
}

fn log_host() {
    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();
    log_host();

    let mode = Mode::from_arg(std::env::args().nth(1).as_deref())?;

    let mut config = if let Some(config) = PlayConfig::try_load() {
        debug!("Loaded config: {:?}", config);
        config
    } else {
        info!("No config found, using the defaults");
        let config = PlayConfig::default();
        if let Err(err) = config.save() {
            warn!("Could not save the default config: {}", err);
        }
        config
    };
    config.apply_env()?;

    let layout: Layout = config
        .layout
        .parse()
        .map_err(|_| eyre!("Unknown layout {:?}", config.layout))?;
    info!(
        "{:?} backend, {} display, {}-bit bus, {:?} scrolling, mode {:?}",
        config.backend, layout, config.bus_width, config.scroll, mode
    );

    match config.backend {
        Backend::Sim => run_sim(&config, layout, mode),
        Backend::Gpiod => run_gpiod(&config, layout, mode),
    }
}

fn run_sim(config: &PlayConfig, layout: Layout, mode: Mode) -> eyre::Result<()> {
    let clock = SimClock::new();
    let wiring = BusWidth::from_bits(config.bus_width).unwrap_or(BusWidth::Eight);
    let mut sim = SimulatedLcd::new(clock.clone(), wiring);
    let probe = sim.probe();

    let mut lcd = Hd44780::with_interface(LcdInterface::Signals(&mut sim), SimDelay::new(clock.clone()));
    lcd.init(config.bus_width)?;
    run_demo(&mut lcd, config, layout, mode, Duration::ZERO)?;
    lcd.cleanup()?;

    info!(
        "{} µs of simulated time, {} timing violations",
        clock.now(),
        probe.timing_violations()
    );
    let border = format!("+{}+", "-".repeat(layout.cols()));
    println!("{}", border);
    for row in probe.screen(&layout) {
        let row: String = row
            .chars()
            .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '.' })
            .collect();
        println!("|{}|", row);
    }
    println!("{}", border);
    Ok(())
}

fn run_gpiod(config: &PlayConfig, layout: Layout, mode: Mode) -> eyre::Result<()> {
    info!(
        "LCD @ {} E: {}, RW: {:?}, RS: {}, BL: {:?}, Data: {:?}",
        config.chip, config.pin_e, config.pin_rw, config.pin_rs, config.pin_bl, config.pins_data
    );

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&config.chip)?;
    debug!("{:?} initialized.", gpio);

    let mut pin_e = gpio.get_pin(config.pin_e)?;
    let pin_e_out = pin_e.as_output()?;
    let mut pin_rs = gpio.get_pin(config.pin_rs)?;
    let pin_rs_out = pin_rs.as_output()?;
    let mut pin_rw = config.pin_rw.map(|pin| gpio.get_pin(pin)).transpose()?;
    let pin_rw_out = pin_rw.as_mut().map(|pin| pin.as_output()).transpose()?;
    let mut pin_bl = config.pin_bl.map(|pin| gpio.get_pin(pin)).transpose()?;
    let pin_bl_out = pin_bl.as_mut().map(|pin| pin.as_output()).transpose()?;

    let bus_4bit;
    let bus_8bit;
    let mut interface = if let Ok(pins) = <[usize; 4]>::try_from(config.pins_data.as_slice()) {
        if config.bus_width != 4 {
            warn!("Only D4..D7 are wired, but the bus width is {}", config.bus_width);
        }
        bus_4bit = gpio.get_pin_bus(pins)?;
        GpioLcdInterface::new_4bit(
            &*pin_e_out,
            pin_rw_out.as_deref(),
            &*pin_rs_out,
            pin_bl_out.as_deref(),
            &*bus_4bit,
        )
    } else if let Ok(pins) = <[usize; 8]>::try_from(config.pins_data.as_slice()) {
        bus_8bit = gpio.get_pin_bus(pins)?;
        GpioLcdInterface::new_8bit(
            &*pin_e_out,
            pin_rw_out.as_deref(),
            &*pin_rs_out,
            pin_bl_out.as_deref(),
            &*bus_8bit,
        )
    } else {
        return Err(eyre!("Invalid number of data pins: {}", config.pins_data.len()));
    };

    debug!(
        "Initializing LCD driver on {} data lines...",
        if interface.data_bus().is_8bit() { 8 } else { 4 }
    );
    let mut lcd = Hd44780::with_interface(LcdInterface::Signals(&mut interface), SpinDelay);
    lcd.init(config.bus_width)?;
    info!("LCD driver initialized.");

    run_demo(&mut lcd, config, layout, mode, Duration::from_secs(1))?;
    lcd.cleanup()?;
    Ok(())
}

/// Runs `mode` on an initialized controller. `pause` is how long the font demo shows each row.
fn run_demo(
    lcd: &mut dyn HD44780Driver,
    config: &PlayConfig,
    layout: Layout,
    mode: Mode,
    pause: Duration,
) -> eyre::Result<()> {
    let scroll: Box<dyn ScrollStrategy> = match config.scroll {
        ScrollMode::Redraw => Box::new(RedrawScroll::new(&layout)),
        ScrollMode::Shift => Box::new(ShiftScroll::new()),
    };
    let dim = AutoDim::with_timeout(
        DeadlineScheduler::new(),
        Duration::from_secs(config.backlight_timeout),
    );
    let mut text = TextDisplay::with_scroll(lcd, layout, scroll)?.with_activity(dim);

    match mode {
        Mode::Hello => {
            let start = Instant::now();
            text.put_str("Welcome to your\nHitachi HD44780U\n")?;
            text.print(format_args!("driving a {} LCD!\n", layout))?;
            let elapsed = start.elapsed();
            text.print(format_args!("[{:.6} seconds]", elapsed.as_secs_f64()))?;
        }
        Mode::Dump => {
            for byte in std::io::stdin().lock().bytes() {
                text.put_byte(byte?)?;
                text.service_backlight()?;
            }
        }
        Mode::Font => {
            for code in 0..=u8::MAX {
                text.put_byte(code)?;
                if !pause.is_zero() && (usize::from(code) + 1) % layout.cols() == 0 {
                    sleep(pause);
                }
            }
        }
    }

    match text.is_busy() {
        Ok((busy, address)) => debug!("Done, busy: {}, address counter: {}", busy, address),
        Err(err) => debug!("Done, busy flag not readable: {}", err),
    }
    text.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes() {
        assert_eq!(Mode::from_arg(None).unwrap(), Mode::Hello);
        assert_eq!(Mode::from_arg(Some("font")).unwrap(), Mode::Font);
        assert!(Mode::from_arg(Some("play")).is_err());
    }

    #[test]
    fn hello_on_the_simulator() {
        let clock = SimClock::new();
        let mut sim = SimulatedLcd::new(clock.clone(), BusWidth::Four);
        let probe = sim.probe();
        let mut lcd = Hd44780::with_interface(LcdInterface::Signals(&mut sim), SimDelay::new(clock));
        lcd.init(4).unwrap();

        let config = PlayConfig::default();
        run_demo(&mut lcd, &config, Layout::LCD_20X4, Mode::Hello, Duration::ZERO).unwrap();

        let screen = probe.screen(&Layout::LCD_20X4);
        assert_eq!(screen[0], "Welcome to your     ");
        assert_eq!(screen[2], "driving a 20x4 LCD! ");
        let timing = screen[3].trim_end();
        assert!(timing.starts_with("[0."));
        assert!(timing.ends_with(" seconds]"));
    }
}
