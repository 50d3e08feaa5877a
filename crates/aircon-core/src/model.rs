//! Physical model of one air-conditioner unit.
//!
//! [`DeviceState`] holds everything the simulation knows about a unit and
//! [`DeviceState::step`] advances it by one tick. A step is a single
//! state transition with a fixed order of operations:
//!
//! 1. runtime accounting and filter wear
//! 2. injected fault profile
//! 3. outdoor temperature drift toward a daily target
//! 4. passive indoor warming while the compressor is off
//! 5. compressor control
//! 6. power and fan model while the compressor runs
//! 7. power and fan model while it does not
//! 8. sensor jitter and range clamping
//!
//! All randomness comes from the caller's RNG, so a seeded RNG replays a
//! run exactly.

use std::ops::RangeInclusive;

use rand::Rng;
use time::OffsetDateTime;
use tracing::{debug, info};

use aircon_types::{
    CompressorStatus, ErrorCode, FaultType, FilterStatus, Mode, ShadowReported, TelemetryRecord,
    WattageMode,
};

/// Indoor temperature range in °C.
pub const INDOOR_TEMP_RANGE: RangeInclusive<f64> = 12.0..=30.0;
/// Outdoor temperature range in °C.
pub const OUTDOOR_TEMP_RANGE: RangeInclusive<f64> = 22.0..=34.0;
/// Refrigerant pressure range in psi.
pub const PRESSURE_RANGE_PSI: RangeInclusive<f64> = 50.0..=300.0;
/// Relative humidity range in percent.
pub const HUMIDITY_RANGE: RangeInclusive<i32> = 0..=100;

/// Runtime after which a clean filter needs cleaning.
pub const FILTER_SERVICE_HOURS: f64 = 500.0;
/// Hours between outdoor target refreshes.
pub const OUTDOOR_TARGET_PERIOD_HOURS: f64 = 24.0;
/// Seconds of passive warming per +1 °C indoors.
pub const PASSIVE_WARMING_SECONDS: f64 = 60.0;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MAX_COOLING_WATTS: f64 = 1200.0;
const BASE_COOLING_WATTS: f64 = 800.0;
const WATTS_PER_DEGREE_EXCESS: f64 = 40.0;
const FAN_ONLY_WATTS: f64 = 200.0;

/// Complete simulated state of one unit.
///
/// Owned by exactly one device runner; mutated only by [`DeviceState::step`]
/// and by the command dispatcher (and the job executor for `version`).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// Device (thing) name.
    pub name: String,

    pub indoor_temp_c: f64,
    pub outdoor_temp_c: f64,
    pub target_outdoor_temp_c: f64,
    pub setpoint_temp_c: f64,

    pub indoor_humidity_pct: i32,
    pub outdoor_humidity_pct: i32,

    pub power_watts: f64,
    pub fan_rpm: u32,
    pub wattage_mode: WattageMode,

    pub compressor: CompressorStatus,
    pub refrigerant_pressure_psi: f64,

    pub mode: Mode,
    pub filter_status: FilterStatus,
    /// Accumulated run time. Only ever grows, except for an explicit reset.
    pub runtime_hours: f64,
    pub error_code: ErrorCode,

    pub fault_injected: bool,
    /// `None` while injected means the operator named no known fault.
    pub fault_type: Option<FaultType>,

    /// Changed only by the job executor.
    pub version: f64,

    pub next_target_update_hours: f64,
    pub seconds_since_cooldown_increase: f64,
    /// Error code as of the last alert decision.
    pub last_error_code: ErrorCode,
}

/// A telemetry record together with when it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub captured_at: OffsetDateTime,
    pub wattage_mode: WattageMode,
    pub record: TelemetryRecord,
}

/// Result of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub sample: TelemetrySample,
    /// The compressor switched on or off during this step.
    pub compressor_changed: bool,
}

impl DeviceState {
    /// A unit with fixed mid-range readings. Mostly useful for tests.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indoor_temp_c: 25.0,
            outdoor_temp_c: 28.0,
            target_outdoor_temp_c: 28.0,
            setpoint_temp_c: 23.0,
            indoor_humidity_pct: 50,
            outdoor_humidity_pct: 70,
            power_watts: 0.0,
            fan_rpm: 0,
            wattage_mode: WattageMode::Normal,
            compressor: CompressorStatus::Off,
            refrigerant_pressure_psi: 200.0,
            mode: Mode::Cool,
            filter_status: FilterStatus::Clean,
            runtime_hours: 0.0,
            error_code: ErrorCode::None,
            fault_injected: false,
            fault_type: None,
            version: 1.0,
            next_target_update_hours: OUTDOOR_TARGET_PERIOD_HOURS,
            seconds_since_cooldown_increase: 0.0,
            last_error_code: ErrorCode::None,
        }
    }

    /// A freshly powered unit with randomized starting conditions.
    pub fn randomized<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        let outdoor = f64::from(rng.random_range(22..=34_i32));
        Self {
            indoor_temp_c: f64::from(rng.random_range(12..=30_i32)),
            outdoor_temp_c: outdoor,
            target_outdoor_temp_c: outdoor,
            setpoint_temp_c: f64::from(rng.random_range(23..=24_i32)),
            indoor_humidity_pct: rng.random_range(40..=60),
            outdoor_humidity_pct: rng.random_range(60..=80),
            refrigerant_pressure_psi: f64::from(rng.random_range(150..=250_i32)),
            ..Self::new(name)
        }
    }

    /// Advance the simulation by `interval_seconds`.
    ///
    /// `interval_seconds` must be positive.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        interval_seconds: f64,
        now: OffsetDateTime,
        rng: &mut R,
    ) -> StepOutcome {
        let compressor_before = self.compressor;

        self.advance_runtime(interval_seconds);
        self.apply_fault(rng);
        self.drift_outdoor(interval_seconds, rng);
        self.passive_warming(interval_seconds);
        self.control_compressor();
        self.update_power_and_fan(rng);

        let compressor_changed = self.compressor != compressor_before;
        if compressor_changed {
            info!(
                device = %self.name,
                "Compressor changed from {} to {}",
                compressor_before,
                self.compressor
            );
        }
        self.jitter_and_clamp(rng);

        StepOutcome {
            sample: TelemetrySample {
                captured_at: now,
                wattage_mode: self.wattage_mode,
                record: self.telemetry(),
            },
            compressor_changed,
        }
    }

    fn advance_runtime(&mut self, interval_seconds: f64) {
        self.runtime_hours += interval_seconds / 3600.0;
        if self.runtime_hours >= FILTER_SERVICE_HOURS && self.filter_status == FilterStatus::Clean {
            self.filter_status = FilterStatus::NeedsCleaning;
            info!(
                device = %self.name,
                "Filter status changed to '{}' after {} hours",
                self.filter_status,
                self.runtime_hours as i64
            );
        }
    }

    fn apply_fault<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.fault_injected {
            self.error_code = ErrorCode::None;
            return;
        }
        let Some(fault) = self.fault_type else {
            // Injected without a recognized fault: leave the code as it was.
            return;
        };
        match fault {
            FaultType::HighTemperature => {
                self.indoor_temp_c += f64::from(rng.random_range(5..=10_i32));
            }
            FaultType::LowPressure => {
                let floor = *PRESSURE_RANGE_PSI.start();
                self.refrigerant_pressure_psi = rng.random_range(floor..=floor + 10.0);
            }
            FaultType::CompressorFailure => {
                self.compressor = CompressorStatus::Off;
                self.power_watts = 0.0;
            }
        }
        self.error_code = fault.error_code();
    }

    fn drift_outdoor<R: Rng + ?Sized>(&mut self, interval_seconds: f64, rng: &mut R) {
        if self.runtime_hours >= self.next_target_update_hours {
            self.target_outdoor_temp_c = f64::from(rng.random_range(22..=34_i32));
            self.next_target_update_hours += OUTDOOR_TARGET_PERIOD_HOURS;
            info!(
                device = %self.name,
                "New target outdoor temperature set to {}",
                self.target_outdoor_temp_c
            );
        }
        let updates_per_day = SECONDS_PER_DAY / interval_seconds;
        self.outdoor_temp_c += (self.target_outdoor_temp_c - self.outdoor_temp_c) / updates_per_day;
    }

    fn passive_warming(&mut self, interval_seconds: f64) {
        if self.compressor == CompressorStatus::Off && self.outdoor_temp_c > self.indoor_temp_c {
            self.seconds_since_cooldown_increase += interval_seconds;
            // At most one degree per step, however long the step.
            if self.seconds_since_cooldown_increase >= PASSIVE_WARMING_SECONDS {
                self.indoor_temp_c += 1.0;
                self.seconds_since_cooldown_increase -= PASSIVE_WARMING_SECONDS;
                debug!(
                    device = %self.name,
                    "Indoor temperature increased by 1 to {}",
                    self.indoor_temp_c
                );
            }
        } else {
            self.seconds_since_cooldown_increase = 0.0;
        }
    }

    fn control_compressor(&mut self) {
        self.compressor = if self.compressor_failed() {
            CompressorStatus::Off
        } else {
            match self.mode {
                Mode::Cool if self.indoor_temp_c <= self.setpoint_temp_c => CompressorStatus::Off,
                Mode::Cool => CompressorStatus::On,
                Mode::Off | Mode::FanOnly => CompressorStatus::Off,
            }
        };
    }

    /// An injected compressor failure holds the compressor off.
    fn compressor_failed(&self) -> bool {
        self.fault_injected && self.fault_type == Some(FaultType::CompressorFailure)
    }

    fn update_power_and_fan<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match (self.compressor, self.mode) {
            (CompressorStatus::On, _) if self.wattage_mode == WattageMode::Abnormal => {
                self.power_watts = f64::from(rng.random_range(1250..=1800_i32));
                self.fan_rpm = rng.random_range(1000..=1500);
                debug!(
                    device = %self.name,
                    "Abnormal wattage mode active: wattage set to {}",
                    self.power_watts
                );
            }
            (CompressorStatus::On, _) => {
                let temp_diff = self.indoor_temp_c - self.outdoor_temp_c;
                let efficiency = (1.0 - temp_diff.abs() * 0.05).max(0.1);
                self.indoor_temp_c -= (efficiency * 0.5).trunc();
                if self.indoor_temp_c < self.setpoint_temp_c {
                    self.indoor_temp_c = self.setpoint_temp_c;
                }
                let excess = (self.indoor_temp_c - self.setpoint_temp_c).max(0.0);
                self.power_watts =
                    (BASE_COOLING_WATTS + excess * WATTS_PER_DEGREE_EXCESS).min(MAX_COOLING_WATTS);
                self.fan_rpm = rng.random_range(1000..=1500);
            }
            (CompressorStatus::Off, Mode::Off) => {
                self.power_watts = 0.0;
                self.fan_rpm = 0;
            }
            (CompressorStatus::Off, Mode::FanOnly) => {
                self.power_watts = FAN_ONLY_WATTS;
                self.fan_rpm = rng.random_range(500..=700);
            }
            (CompressorStatus::Off, Mode::Cool) => {
                self.power_watts = 0.0;
                self.fan_rpm = rng.random_range(500..=700);
            }
        }
    }

    fn jitter_and_clamp<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.refrigerant_pressure_psi = (self.refrigerant_pressure_psi
            + f64::from(rng.random_range(-2..=2_i32)))
        .clamp(*PRESSURE_RANGE_PSI.start(), *PRESSURE_RANGE_PSI.end());

        self.indoor_humidity_pct = (self.indoor_humidity_pct + rng.random_range(-1..=1))
            .clamp(*HUMIDITY_RANGE.start(), *HUMIDITY_RANGE.end());
        self.outdoor_humidity_pct = (self.outdoor_humidity_pct + rng.random_range(-1..=1))
            .clamp(*HUMIDITY_RANGE.start(), *HUMIDITY_RANGE.end());

        self.indoor_temp_c = self
            .indoor_temp_c
            .clamp(*INDOOR_TEMP_RANGE.start(), *INDOOR_TEMP_RANGE.end());
        self.outdoor_temp_c = self
            .outdoor_temp_c
            .clamp(*OUTDOOR_TEMP_RANGE.start(), *OUTDOOR_TEMP_RANGE.end());
    }

    /// Current state as a telemetry record.
    pub fn telemetry(&self) -> TelemetryRecord {
        TelemetryRecord {
            device_name: self.name.clone(),
            indoor_temperature_c: self.indoor_temp_c as i64,
            outdoor_temperature_c: self.outdoor_temp_c as i64,
            setpoint_temperature_c: self.setpoint_temp_c as i64,
            mode: self.mode,
            indoor_humidity_percent: i64::from(self.indoor_humidity_pct),
            outdoor_humidity_percent: i64::from(self.outdoor_humidity_pct),
            power_consumption_watts: self.power_watts.round_ties_even() as i64,
            compressor_status: self.compressor,
            fan_speed_rpm: i64::from(self.fan_rpm),
            refrigerant_pressure_psi: self.refrigerant_pressure_psi as i64,
            error_code: self.error_code,
            filter_status: self.filter_status,
            runtime_hours: self.runtime_hours.round_ties_even() as i64,
        }
    }

    /// Current state projected onto the shadow's reported fields.
    pub fn shadow_projection(&self) -> ShadowReported {
        ShadowReported {
            indoor_temperature_c: self.indoor_temp_c as i64,
            outdoor_temperature_c: self.outdoor_temp_c as i64,
            setpoint_temperature_c: self.setpoint_temp_c as i64,
            mode: self.mode,
            power_consumption_watts: self.power_watts.round_ties_even() as i64,
            compressor_status: self.compressor,
            wattage_mode: self.wattage_mode,
        }
    }

    /// Decide whether the current error code warrants a new alert.
    ///
    /// Returns the code on a transition from `None` into any fault. Staying
    /// in a fault (or moving between faults) does not re-alert; returning to
    /// `None` re-arms the latch.
    pub fn take_error_edge(&mut self) -> Option<ErrorCode> {
        if self.error_code.is_fault() {
            if self.last_error_code.is_fault() {
                return None;
            }
            self.last_error_code = self.error_code;
            Some(self.error_code)
        } else {
            self.last_error_code = ErrorCode::None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x00C0_FFEE)
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    fn cooling_unit() -> DeviceState {
        DeviceState {
            indoor_temp_c: 30.0,
            setpoint_temp_c: 23.0,
            ..DeviceState::new("ac-test")
        }
    }

    #[test]
    fn test_first_tick_starts_compressor() {
        let mut state = cooling_unit();
        let outcome = state.step(60.0, now(), &mut rng());

        assert!(outcome.compressor_changed);
        let record = outcome.sample.record;
        assert_eq!(record.compressor_status, CompressorStatus::On);
        assert!((800..=1200).contains(&record.power_consumption_watts));
        assert_eq!(record.error_code, ErrorCode::None);
        assert!((1000..=1500).contains(&record.fan_speed_rpm));
    }

    #[test]
    fn test_power_scales_with_excess_and_caps() {
        let mut state = DeviceState {
            indoor_temp_c: 25.0,
            outdoor_temp_c: 25.0,
            target_outdoor_temp_c: 25.0,
            setpoint_temp_c: 23.0,
            ..DeviceState::new("ac-test")
        };
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.power_watts, 880.0);

        state.indoor_temp_c = 30.0;
        state.setpoint_temp_c = 12.0;
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.power_watts, 1200.0);
    }

    #[test]
    fn test_compressor_off_at_setpoint() {
        let mut state = DeviceState {
            indoor_temp_c: 23.0,
            outdoor_temp_c: 22.0,
            target_outdoor_temp_c: 22.0,
            compressor: CompressorStatus::On,
            ..DeviceState::new("ac-test")
        };
        let outcome = state.step(60.0, now(), &mut rng());
        assert!(outcome.compressor_changed);
        assert_eq!(state.compressor, CompressorStatus::Off);
        assert_eq!(state.power_watts, 0.0);
        assert!((500..=700).contains(&state.fan_rpm));
    }

    #[test]
    fn test_mode_off_and_fan_only() {
        let mut state = DeviceState {
            mode: Mode::Off,
            ..cooling_unit()
        };
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.compressor, CompressorStatus::Off);
        assert_eq!(state.power_watts, 0.0);
        assert_eq!(state.fan_rpm, 0);

        state.mode = Mode::FanOnly;
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.compressor, CompressorStatus::Off);
        assert_eq!(state.power_watts, 200.0);
        assert!((500..=700).contains(&state.fan_rpm));
    }

    #[test]
    fn test_abnormal_wattage_surge() {
        let mut state = DeviceState {
            wattage_mode: WattageMode::Abnormal,
            ..cooling_unit()
        };
        let outcome = state.step(60.0, now(), &mut rng());
        let watts = outcome.sample.record.power_consumption_watts;
        assert!((1250..=1800).contains(&watts), "watts = {}", watts);
        assert_eq!(outcome.sample.wattage_mode, WattageMode::Abnormal);
    }

    #[test]
    fn test_high_temperature_fault() {
        let mut state = DeviceState {
            indoor_temp_c: 15.0,
            outdoor_temp_c: 22.0,
            target_outdoor_temp_c: 22.0,
            setpoint_temp_c: 14.0,
            fault_injected: true,
            fault_type: Some(FaultType::HighTemperature),
            ..DeviceState::new("ac-test")
        };
        // Passive warming needs 60 s of accumulation, so in a 1 s step the
        // fault raise is the only thing moving the indoor temperature.
        state.step(1.0, now(), &mut rng());
        assert!(
            (20.0..=25.0).contains(&state.indoor_temp_c),
            "indoor = {}",
            state.indoor_temp_c
        );
        assert_eq!(state.error_code, ErrorCode::E1);
    }

    #[test]
    fn test_low_pressure_fault() {
        let mut state = DeviceState {
            fault_injected: true,
            fault_type: Some(FaultType::LowPressure),
            ..DeviceState::new("ac-test")
        };
        state.step(60.0, now(), &mut rng());
        // Fault lands in [50, 60], jitter adds at most ±2 and clamps at 50.
        assert!((50.0..=62.0).contains(&state.refrigerant_pressure_psi));
        assert_eq!(state.error_code, ErrorCode::E2);
    }

    #[test]
    fn test_compressor_failure_fault() {
        let mut state = DeviceState {
            compressor: CompressorStatus::On,
            power_watts: 1100.0,
            fault_injected: true,
            fault_type: Some(FaultType::CompressorFailure),
            ..cooling_unit()
        };
        let mut rng = rng();
        // Cooling demand is high, but the failed compressor stays off.
        for _ in 0..5 {
            let outcome = state.step(60.0, now(), &mut rng);
            assert_eq!(outcome.sample.record.compressor_status, CompressorStatus::Off);
            assert_eq!(outcome.sample.record.power_consumption_watts, 0);
            assert_eq!(outcome.sample.record.error_code, ErrorCode::E3);
        }
    }

    #[test]
    fn test_compressor_failure_reports_transition() {
        let mut state = DeviceState {
            compressor: CompressorStatus::On,
            fault_injected: true,
            fault_type: Some(FaultType::CompressorFailure),
            ..cooling_unit()
        };
        let outcome = state.step(60.0, now(), &mut rng());
        assert!(outcome.compressor_changed);

        state.fault_injected = false;
        state.fault_type = None;
        let outcome = state.step(60.0, now(), &mut rng());
        assert!(outcome.compressor_changed);
        assert_eq!(state.compressor, CompressorStatus::On);
    }

    #[test]
    fn test_unknown_fault_keeps_error_code() {
        let mut state = DeviceState {
            error_code: ErrorCode::E2,
            fault_injected: true,
            fault_type: None,
            ..DeviceState::new("ac-test")
        };
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.error_code, ErrorCode::E2);

        state.fault_injected = false;
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.error_code, ErrorCode::None);
    }

    #[test]
    fn test_filter_needs_cleaning_after_service_hours() {
        let mut state = DeviceState {
            runtime_hours: 499.99,
            ..DeviceState::new("ac-test")
        };
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.filter_status, FilterStatus::NeedsCleaning);

        // A replaced filter does not flip back to "Needs Cleaning".
        state.filter_status = FilterStatus::Replace;
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.filter_status, FilterStatus::Replace);
    }

    #[test]
    fn test_outdoor_target_refresh_every_day() {
        let mut state = DeviceState {
            runtime_hours: 23.99,
            ..DeviceState::new("ac-test")
        };
        state.step(60.0, now(), &mut rng());
        assert_eq!(state.next_target_update_hours, 48.0);
        assert!((22.0..=34.0).contains(&state.target_outdoor_temp_c));
    }

    #[test]
    fn test_outdoor_moves_toward_target() {
        let mut state = DeviceState {
            outdoor_temp_c: 24.0,
            target_outdoor_temp_c: 34.0,
            ..DeviceState::new("ac-test")
        };
        // One hour step: 1/24 of the gap.
        state.step(3600.0, now(), &mut rng());
        assert!((state.outdoor_temp_c - (24.0 + 10.0 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn test_passive_warming_accumulator() {
        let mut state = DeviceState {
            indoor_temp_c: 20.0,
            outdoor_temp_c: 30.0,
            target_outdoor_temp_c: 30.0,
            mode: Mode::Off,
            ..DeviceState::new("ac-test")
        };
        let mut rng = rng();
        state.step(30.0, now(), &mut rng);
        assert_eq!(state.indoor_temp_c, 20.0);
        assert_eq!(state.seconds_since_cooldown_increase, 30.0);

        state.step(45.0, now(), &mut rng);
        assert_eq!(state.indoor_temp_c, 21.0);
        assert_eq!(state.seconds_since_cooldown_increase, 15.0);

        // Long steps still add one degree at most.
        state.step(600.0, now(), &mut rng);
        assert_eq!(state.indoor_temp_c, 22.0);
        assert_eq!(state.seconds_since_cooldown_increase, 555.0);
    }

    #[test]
    fn test_passive_warming_resets_when_not_warmer_outside() {
        let mut state = DeviceState {
            indoor_temp_c: 29.0,
            outdoor_temp_c: 28.0,
            target_outdoor_temp_c: 28.0,
            mode: Mode::Off,
            seconds_since_cooldown_increase: 45.0,
            ..DeviceState::new("ac-test")
        };
        state.step(30.0, now(), &mut rng());
        assert_eq!(state.seconds_since_cooldown_increase, 0.0);
        assert_eq!(state.indoor_temp_c, 29.0);
    }

    #[test]
    fn test_integer_reporting() {
        let state = DeviceState {
            indoor_temp_c: 24.9,
            outdoor_temp_c: 31.7,
            power_watts: 880.5,
            runtime_hours: 2.5,
            refrigerant_pressure_psi: 57.8,
            ..DeviceState::new("ac-test")
        };
        let record = state.telemetry();
        assert_eq!(record.indoor_temperature_c, 24);
        assert_eq!(record.outdoor_temperature_c, 31);
        assert_eq!(record.power_consumption_watts, 880);
        assert_eq!(record.runtime_hours, 2);
        assert_eq!(record.refrigerant_pressure_psi, 57);
    }

    #[test]
    fn test_error_edge_sequence() {
        let mut state = DeviceState::new("ac-test");
        let mut alerts = Vec::new();
        for code in [
            ErrorCode::None,
            ErrorCode::E1,
            ErrorCode::E1,
            ErrorCode::None,
            ErrorCode::E1,
        ] {
            state.error_code = code;
            alerts.extend(state.take_error_edge());
        }
        assert_eq!(alerts, vec![ErrorCode::E1, ErrorCode::E1]);
    }

    #[test]
    fn test_error_edge_ignores_fault_to_fault() {
        let mut state = DeviceState::new("ac-test");
        state.error_code = ErrorCode::E1;
        assert_eq!(state.take_error_edge(), Some(ErrorCode::E1));
        state.error_code = ErrorCode::E3;
        assert_eq!(state.take_error_edge(), None);
    }

    #[test]
    fn test_randomized_ranges() {
        let mut rng = rng();
        for _ in 0..50 {
            let state = DeviceState::randomized("ac-test", &mut rng);
            assert!(INDOOR_TEMP_RANGE.contains(&state.indoor_temp_c));
            assert!(OUTDOOR_TEMP_RANGE.contains(&state.outdoor_temp_c));
            assert_eq!(state.target_outdoor_temp_c, state.outdoor_temp_c);
            assert!((23.0..=24.0).contains(&state.setpoint_temp_c));
            assert!((40..=60).contains(&state.indoor_humidity_pct));
            assert!((60..=80).contains(&state.outdoor_humidity_pct));
            assert!((150.0..=250.0).contains(&state.refrigerant_pressure_psi));
            assert_eq!(state.version, 1.0);
            assert_eq!(state.compressor, CompressorStatus::Off);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut rng = StdRng::seed_from_u64(42);
            let mut state = DeviceState::randomized("ac-test", &mut rng);
            (0..20)
                .map(|_| state.step(60.0, now(), &mut rng).sample.record)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}

/// Property tests for the model's range and monotonicity guarantees.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fault() -> impl Strategy<Value = Option<FaultType>> {
        prop::option::of(prop::sample::select(FaultType::ALL.to_vec()))
    }

    proptest! {
        /// Whatever the mode, fault and tick length, readings stay in range.
        #[test]
        fn step_keeps_readings_in_range(
            seed: u64,
            interval in 1.0f64..7200.0,
            steps in 1usize..60,
            mode in prop::sample::select(Mode::ALL.to_vec()),
            wattage in prop::sample::select(WattageMode::ALL.to_vec()),
            fault in fault(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = DeviceState::randomized("ac-prop", &mut rng);
            state.mode = mode;
            state.wattage_mode = wattage;
            state.fault_injected = fault.is_some();
            state.fault_type = fault;

            for _ in 0..steps {
                let before = state.runtime_hours;
                let outcome = state.step(interval, OffsetDateTime::UNIX_EPOCH, &mut rng);

                prop_assert!(INDOOR_TEMP_RANGE.contains(&state.indoor_temp_c));
                prop_assert!(OUTDOOR_TEMP_RANGE.contains(&state.outdoor_temp_c));
                prop_assert!(PRESSURE_RANGE_PSI.contains(&state.refrigerant_pressure_psi));
                prop_assert!(HUMIDITY_RANGE.contains(&state.indoor_humidity_pct));
                prop_assert!(HUMIDITY_RANGE.contains(&state.outdoor_humidity_pct));
                prop_assert!(state.runtime_hours > before);
                prop_assert_eq!(state.version, 1.0);
                if mode != Mode::Cool {
                    prop_assert_eq!(state.compressor, CompressorStatus::Off);
                }
                prop_assert_eq!(outcome.sample.record.indoor_temperature_c, state.indoor_temp_c as i64);
            }
        }

        /// The error latch yields at most one alert per entry into a fault.
        #[test]
        fn error_edge_alerts_once_per_entry(codes in prop::collection::vec(prop::sample::select(ErrorCode::ALL.to_vec()), 0..40)) {
            let mut state = DeviceState::new("ac-prop");
            let mut previous = ErrorCode::None;
            for code in codes {
                state.error_code = code;
                let alert = state.take_error_edge();
                let expected = (code.is_fault() && !previous.is_fault()).then_some(code);
                prop_assert_eq!(alert, expected);
                previous = code;
            }
        }
    }
}
