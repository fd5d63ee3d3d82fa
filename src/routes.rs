use crate::{
    api::{attendance, geofence, job, notify, worker},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance/validate-location
                    .service(
                        web::resource("/validate-location")
                            .route(web::post().to(attendance::validate_location)),
                    )
                    // /attendance/punch
                    .service(web::resource("/punch").route(web::post().to(attendance::punch))),
            )
            .service(
                web::scope("/workers")
                    // /workers
                    .service(web::resource("").route(web::post().to(worker::create_worker)))
                    // /workers/{id}
                    .service(web::resource("/{id}").route(web::get().to(worker::get_worker)))
                    // /workers/{id}/attendance
                    .service(
                        web::resource("/{id}/attendance")
                            .route(web::get().to(attendance::attendance_history)),
                    )
                    // /workers/{id}/descriptors
                    .service(
                        web::resource("/{id}/descriptors")
                            .route(web::post().to(worker::enroll_descriptor)),
                    )
                    // /workers/{id}/rfid
                    .service(web::resource("/{id}/rfid").route(web::put().to(worker::assign_rfid))),
            )
            .service(
                web::scope("/geofence")
                    // /geofence
                    .service(
                        web::resource("")
                            .route(web::get().to(geofence::get_geofence))
                            .route(web::put().to(geofence::update_geofence)),
                    ),
            )
            .service(
                web::scope("/jobs")
                    // /jobs
                    .service(web::resource("").route(web::post().to(job::create_job)))
                    // /jobs/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(job::get_job))
                            .route(web::put().to(job::update_job)),
                    )
                    // /jobs/{id}/notify
                    .service(
                        web::resource("/{id}/notify").route(web::post().to(notify::notify_job)),
                    ),
            ),
    );
}
