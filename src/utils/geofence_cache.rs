use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::geofence::GeofenceConfig;

/// Geofence config is read on every punch but mutated rarely; a short TTL
/// keeps reads off the database. Bounded staleness here is harmless — the
/// admin update below invalidates eagerly anyway.
const CACHE_TTL_SECS: u64 = 30;

const KEY: &str = "geofence";

static GEOFENCE_CACHE: Lazy<Cache<&'static str, GeofenceConfig>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
        .build()
});

async fn fetch(pool: &MySqlPool) -> Result<GeofenceConfig> {
    let config = sqlx::query_as::<_, GeofenceConfig>(
        r#"
        SELECT enabled, latitude, longitude, radius_m, updated_at
        FROM geofence_settings
        WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    // no row yet means the admin never configured a geofence
    Ok(config.unwrap_or_else(GeofenceConfig::disabled))
}

/// Current config, served from cache within the TTL.
pub async fn get(pool: &MySqlPool) -> Result<GeofenceConfig> {
    if let Some(config) = GEOFENCE_CACHE.get(&KEY).await {
        return Ok(config);
    }

    let config = fetch(pool).await?;
    GEOFENCE_CACHE.insert(KEY, config.clone()).await;
    Ok(config)
}

/// Persist the admin's config and drop the cached copy.
pub async fn set(pool: &MySqlPool, config: &GeofenceConfig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO geofence_settings (id, enabled, latitude, longitude, radius_m, updated_at)
        VALUES (1, ?, ?, ?, ?, NOW())
        ON DUPLICATE KEY UPDATE
            enabled = VALUES(enabled),
            latitude = VALUES(latitude),
            longitude = VALUES(longitude),
            radius_m = VALUES(radius_m),
            updated_at = NOW()
        "#,
    )
    .bind(config.enabled)
    .bind(config.latitude)
    .bind(config.longitude)
    .bind(config.radius_m)
    .execute(pool)
    .await?;

    GEOFENCE_CACHE.invalidate(&KEY).await;
    Ok(())
}
