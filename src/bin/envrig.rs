//! Takes a series of BME680 readings and reports the air quality of the last one.
//!
//! Usage:
//! ```text
//! envrig --count 5 --delay 3
//! envrig --count 5 --delay 3 --bus /dev/i2c-0 --address 0x77
//! ```

use clap::Parser;

#[derive(Parser)]
#[command(name = "envrig")]
#[command(about = "Forced-mode BME680 acquisition with air-quality classification")]
#[command(version)]
struct Args {
    /// Number of heater-stable readings to take
    #[arg(short, long, default_value_t = 1)]
    count: u32,

    /// Delay between readings in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = 3)]
    delay: u32,

    /// I2C bus device
    #[arg(long, default_value = envrig::session::DEFAULT_BUS_PATH)]
    bus: String,

    /// BME680 address, decimal or 0x-prefixed hex
    #[arg(long, default_value = "0x76", value_parser = parse_address)]
    address: u16,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

#[cfg(target_os = "linux")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use envrig::{
        run_acquisition_session, session, Completion, ConsoleSink, Milliseconds, ReadingValidator,
        SessionOptions,
    };

    env_logger::init();
    let args = Args::parse();

    let port = session::open_port(&args.bus, args.address)
        .with_context(|| format!("opening BME680 at 0x{:02x} on {}", args.address, args.bus))?;

    let delay_ms = args.delay.saturating_mul(1000);
    let options = SessionOptions::new(args.count, Milliseconds(delay_ms));
    let acquisition = run_acquisition_session(port, &options, ConsoleSink::stdout())
        .context("acquisition session failed")?;

    if let Completion::Partial { acquired, target } = acquisition.completion {
        eprintln!(
            "warning: only {} of {} stable readings after {} attempts",
            acquired, target, acquisition.attempts
        );
    }

    let last = acquisition
        .readings
        .last()
        .context("no heater-stable reading was acquired")?;
    let bucket = ReadingValidator::default()
        .classify(last)
        .context("last reading failed validation")?;

    println!(
        "Temperature: {:.2} degC, Air pressure: {:.2} hPa, Humidity: {:.2} %rH",
        last.temperature, last.pressure, last.relative_humidity
    );
    println!("Air quality is {}", bucket);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::bail!(
        "no I2C backend for this platform (requested {} at 0x{:02x})",
        args.bus,
        args.address
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_in_hex_and_decimal() {
        assert_eq!(parse_address("0x76"), Ok(0x76));
        assert_eq!(parse_address("0X77"), Ok(0x77));
        assert_eq!(parse_address("104"), Ok(104));
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["envrig"]);
        assert_eq!(args.count, 1);
        assert_eq!(args.delay, 3);
        assert_eq!(args.bus, "/dev/i2c-1");
        assert_eq!(args.address, 0x76);
    }
}
