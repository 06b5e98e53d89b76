use crate::errors::Result;
use rand::Rng;

/// One environmental sample: °C, hPa, %RH.
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

/// A blocking source of environmental readings. Hardware drivers (e.g. a
/// BME280 behind an I2C bus) implement this; a failed bus read surfaces as
/// `Error::Sensor`.
pub trait SensorSource {
    fn sample(&mut self) -> Result<Reading>;
}

/// Software source producing plausible BME280-like readings, used when no
/// hardware bus is attached.
pub struct SimulatedSensor;

impl SensorSource for SimulatedSensor {
    fn sample(&mut self) -> Result<Reading> {
        let mut rng = rand::thread_rng();
        Ok(Reading {
            temperature: rng.gen_range(15.0..35.0),
            pressure: rng.gen_range(980.0..1040.0),
            humidity: rng.gen_range(30.0..80.0),
        })
    }
}
