pub mod heater;
pub mod sensor;
