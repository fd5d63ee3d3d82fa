pub mod biometric;
pub mod cooldown;
pub mod geofence;
pub mod history;
pub mod recorder;
pub mod store;
