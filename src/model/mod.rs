pub mod attendance;
pub mod geofence;
pub mod job;
pub mod role;
pub mod worker;
