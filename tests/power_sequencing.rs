//! Power-up and power-down sequencing: voltage regulator, oscillator,
//! strobe legality per state.

mod common;

use cc2520_core::regs::*;
use cc2520_core::{RadioState, OSC_STARTUP_MS, VREG_STARTUP_MS};
use common::Bench;

#[test]
fn vreg_enable_reaches_power_down_after_startup_delay() {
    let mut bench = Bench::new();
    assert_eq!(bench.chip.state(), RadioState::VregOff);
    bench.chip.set_vreg_on(true);
    // Nothing happens until the regulator startup timer fires.
    assert_eq!(bench.chip.state(), RadioState::VregOff);
    assert!(!bench.chip.vreg_on());
    bench.run();
    assert!(bench.chip.vreg_on());
    assert_eq!(bench.chip.state(), RadioState::PowerDown);
    assert!((bench.host.0.borrow().now_ms - VREG_STARTUP_MS).abs() < 1e-9);
}

#[test]
fn oscillator_strobe_reaches_idle_and_sets_status() {
    let mut bench = Bench::new();
    bench.chip.set_vreg_on(true);
    bench.run();
    bench.strobe(INS_SXOSCON);
    assert_eq!(bench.chip.state(), RadioState::PowerDown);
    bench.run();
    assert_eq!(bench.chip.state(), RadioState::Idle);
    assert!(bench.chip.status_byte() & STATUS_XOSC16M_STABLE != 0);
    let elapsed = bench.host.0.borrow().now_ms;
    assert!((elapsed - (VREG_STARTUP_MS + OSC_STARTUP_MS)).abs() < 1e-9);
}

#[test]
fn spi_is_dead_while_vreg_is_off() {
    let mut bench = Bench::new();
    bench.chip.set_chip_select(true);
    assert_eq!(bench.chip.spi_exchange(INS_SXOSCON), 0);
    bench.chip.set_chip_select(false);
    bench.run();
    assert_eq!(bench.chip.state(), RadioState::VregOff);
}

#[test]
fn strobes_other_than_oscillator_on_are_ignored_in_power_down() {
    let mut bench = Bench::new();
    bench.chip.set_vreg_on(true);
    bench.run();
    bench.strobe(INS_SRXON);
    bench.strobe(INS_STXON);
    bench.run();
    assert_eq!(bench.chip.state(), RadioState::PowerDown);
}

#[test]
fn srxon_enters_rx_only_from_idle() {
    let mut bench = Bench::new();
    bench.power_up();
    bench.strobe(INS_SRXON);
    assert_eq!(bench.chip.state(), RadioState::RxCalibrate);
    bench.run();
    assert_eq!(bench.chip.state(), RadioState::RxSfdSearch);
    assert!(bench.chip.status_byte() & STATUS_RSSI_VALID != 0);
    // A second SRXON while already receiving changes nothing.
    bench.strobe(INS_SRXON);
    assert_eq!(bench.chip.state(), RadioState::RxSfdSearch);
}

#[test]
fn srfoff_returns_to_idle_and_invalidates_rssi() {
    let mut bench = Bench::new();
    bench.power_up();
    bench.strobe(INS_SRXON);
    bench.run();
    bench.strobe(INS_SRFOFF);
    assert_eq!(bench.chip.state(), RadioState::Idle);
    assert!(bench.chip.status_byte() & STATUS_RSSI_VALID == 0);
}

#[test]
fn oscillator_off_drops_back_to_power_down() {
    let mut bench = Bench::new();
    bench.power_up();
    bench.strobe(INS_SXOSCOFF);
    assert_eq!(bench.chip.state(), RadioState::PowerDown);
    assert!(bench.chip.status_byte() & STATUS_XOSC16M_STABLE == 0);
}

#[test]
fn vreg_off_resets_everything() {
    let mut bench = Bench::new();
    bench.power_up();
    bench.strobe(INS_SRXON);
    bench.run();
    bench.chip.set_vreg_on(false);
    assert_eq!(bench.chip.state(), RadioState::VregOff);
    assert!(!bench.chip.vreg_on());
    assert_eq!(bench.chip.status_byte() & STATUS_XOSC16M_STABLE, 0);
    assert_eq!(bench.chip.rx_fifo_len(), 0);
}

#[test]
fn fsmstat0_reports_zero_in_the_powered_down_states() {
    let mut bench = Bench::new();
    assert_eq!(bench.chip.register(REG_FSMSTAT0).unwrap() & 0x3F, 0);
    bench.chip.set_vreg_on(true);
    bench.run();
    // POWER_DOWN has no FSM field encoding either; it must not read as a
    // truncated high state code.
    assert_eq!(bench.chip.register(REG_FSMSTAT0).unwrap() & 0x3F, 0);
    bench.strobe(INS_SXOSCON);
    bench.run();
    bench.strobe(INS_SRXON);
    bench.run();
    assert_eq!(bench.chip.register(REG_FSMSTAT0).unwrap() & 0x3F, 3);
    bench.chip.set_vreg_on(false);
    assert_eq!(bench.chip.register(REG_FSMSTAT0).unwrap() & 0x3F, 0);
}

#[test]
fn default_rssi_makes_channel_clear_once_valid() {
    let mut bench = Bench::new();
    bench.power_up();
    assert!(!bench.chip.cca());
    bench.strobe(INS_SRXON);
    bench.run();
    // Default simulated power is -100 dBm, below the -95 dBm threshold.
    assert!(bench.chip.cca());
    bench.chip.set_rssi(-50);
    assert!(!bench.chip.cca());
}
