pub mod geofence_cache;
pub mod rfid_filter;
