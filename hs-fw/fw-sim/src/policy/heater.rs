use std::time::Instant;

use hs_fw_core::ErrorCode;
use hs_fw_core::tasks::{HeaterPolicy, TemperatureReading, TemperatureReadings};

/// Pad time constant of the thermal model, in seconds.
const TIME_CONSTANT_S: f64 = 20.0;
/// The board follows the pads at this fraction of their rise over ambient.
const BOARD_COUPLING: f64 = 0.15;

/// First-order thermal model of the heater pads.
///
/// Temperature relaxes exponentially toward `ambient + gain * power`; the
/// model is advanced lazily from wall-clock time whenever it is observed or
/// the power changes.
pub struct SimHeater {
    ambient_c: f64,
    gain_c: f64,
    pad_c: f64,
    power: f64,
    updated: Instant,
}

impl SimHeater {
    pub fn new(ambient_c: f64, gain_c: f64) -> Self {
        Self {
            ambient_c,
            gain_c,
            pad_c: ambient_c,
            power: 0.0,
            updated: Instant::now(),
        }
    }

    fn advance(&mut self) {
        let now = Instant::now();
        let dt_s = now.duration_since(self.updated).as_secs_f64();
        self.updated = now;
        let target = self.ambient_c + self.gain_c * self.power;
        let alpha = 1.0 - (-dt_s / TIME_CONSTANT_S).exp();
        self.pad_c += (target - self.pad_c) * alpha;
    }

    fn reading(temperature: f64) -> TemperatureReading {
        // Rough stand-in for a thermistor divider on a 12-bit converter.
        let adc = ((temperature + 40.0) * 20.0).clamp(0.0, 4095.0) as u16;
        TemperatureReading { temperature, adc }
    }
}

impl HeaterPolicy for SimHeater {
    fn read_temperatures(&mut self) -> TemperatureReadings {
        self.advance();
        let board = self.ambient_c + (self.pad_c - self.ambient_c) * BOARD_COUPLING;
        TemperatureReadings {
            pad_a: Self::reading(self.pad_c),
            pad_b: Self::reading(self.pad_c - 0.1),
            board: Self::reading(board),
        }
    }

    fn power_good(&self) -> bool {
        true
    }

    fn set_power_output(&mut self, power: f64) -> Result<(), ErrorCode> {
        if !(0.0..=1.0).contains(&power) {
            return Err(ErrorCode::HeaterHardwareError);
        }
        self.advance();
        self.power = power;
        Ok(())
    }

    fn disable_power_output(&mut self) {
        self.advance();
        self.power = 0.0;
    }
}
