//! Simulator configuration

/// Runtime settings for a [`Simulator`](crate::Simulator).
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Temperature the pads and board start at and cool toward, in °C.
    pub ambient_c: f64,
    /// Steady-state rise above ambient at full heater power, in °C.
    pub heater_gain_c: f64,
    /// Serial number present at startup.
    pub serial_number: Option<String>,
    /// Make every serial number write fail with a HAL error.
    pub fail_serial_writes: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ambient_c: 23.0,
            heater_gain_c: 90.0,
            serial_number: None,
            fail_serial_writes: false,
        }
    }
}
