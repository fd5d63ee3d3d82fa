pub mod attendance;
pub mod geofence;
pub mod job;
pub mod notify;
pub mod worker;
