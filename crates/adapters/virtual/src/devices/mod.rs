//! Virtual remote devices — sensors and switches living behind the
//! loopback broker.

mod sensor;
mod switch;

pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;
