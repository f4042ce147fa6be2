mod common;

use common::{event_log, init_logging, port, Event, SimulatedMcp342x};
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
use envrig::session::MCP342X_ADDRESS;
use envrig::{
    run_calibration, CalibrationError, CalibrationOptions, Mcp342x, SoilClassifier,
    SoilCondition,
};

/// Codes that scale to 0 -> 255 over 10 conversions, then 255 -> 0 over 8.
fn rise_and_fall() -> Vec<i16> {
    let rise = (1..=10).map(|i| i * 2047 / 10);
    let fall = (1..=8).map(|i| 2047 - i * 2047 / 8);
    rise.chain(fall).collect()
}

fn charge_then_discharge() -> PinMock {
    PinMock::new(&[
        PinTransaction::set(State::High),
        PinTransaction::set(State::Low),
    ])
}

#[test]
fn calibration_finds_the_simulated_extremes() {
    init_logging();
    let log = event_log();
    let adc = Mcp342x::new(port(SimulatedMcp342x::new(rise_and_fall()), MCP342X_ADDRESS, &log));
    let mut pin = charge_then_discharge();

    let result = run_calibration(adc, &mut pin, &CalibrationOptions::default()).unwrap();

    assert_eq!(result.dry_threshold(), 255);
    assert_eq!(result.wet_threshold(), 0);
    assert_eq!(result.charge_polls(), 10);
    assert_eq!(result.discharge_polls(), 8);
    pin.done();

    // Each conversion waits for the ADC before fetching.
    let waits = log.borrow().iter().filter(|e| **e == Event::Wait(5)).count();
    assert_eq!(waits, 18);

    let soil = SoilClassifier::new(&result).unwrap();
    assert_eq!(soil.classify(240), SoilCondition::Dry);
    assert_eq!(soil.classify(128), SoilCondition::Moist);
    assert_eq!(soil.classify(3), SoilCondition::Wet);
}

#[test]
fn disconnected_probe_times_out() {
    let log = event_log();
    let adc = Mcp342x::new(port(SimulatedMcp342x::new([800]), MCP342X_ADDRESS, &log));
    let mut pin = charge_then_discharge();
    let options = CalibrationOptions {
        max_polls: 25,
        ..CalibrationOptions::default()
    };

    let err = run_calibration(adc, &mut pin, &options).unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::CalibrationTimeout {
            polls: 25,
            last: 100,
            ..
        }
    ));
    assert_eq!(err.to_string(), "charge phase did not saturate after 25 polls (last value 100)");
    pin.done();
}

#[test]
fn busy_adc_fails_instead_of_saturating() {
    let log = event_log();
    let mut sim = SimulatedMcp342x::new([2047]);
    sim.busy = true;
    let adc = Mcp342x::new(port(sim, MCP342X_ADDRESS, &log));
    let mut pin = charge_then_discharge();

    let err = run_calibration(adc, &mut pin, &CalibrationOptions::default()).unwrap_err();
    assert!(matches!(err, CalibrationError::ConversionNotReady { polls: 4 }));
    // The probe is discharged even though charging never produced a sample.
    pin.done();

    // One conversion, fetched four times.
    let waits = log.borrow().iter().filter(|e| **e == Event::Wait(5)).count();
    assert_eq!(waits, 4);
}
