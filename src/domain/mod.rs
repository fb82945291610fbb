//! Domain model: readings, sensor configuration, alarm state and events.

pub mod events;
pub mod types;

pub use events::{AlarmEvent, AlarmTransition};
pub use types::{
    AlarmKey, AlarmSeverity, AlarmState, AlarmType, Reading, ScalarReading, ScalarSensorConfig,
    SensorStatus, SpectralChannelConfig, SpectrumReading,
};
