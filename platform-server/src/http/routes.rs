use crate::device::HostsManager;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(hosts: HostsManager) -> Router {
    Router::new()
        // 设备查询，支持 udid 或 ip:<地址>
        .route("/api/v1/devices", get(super::handlers::get_devices))
        .route("/api/v1/devices/:query", get(super::handlers::get_device_detail))
        // 设备占用
        .route(
            "/api/v1/devices/:query/reserve",
            post(super::handlers::reserve_device).delete(super::handlers::release_device),
        )
        // 健康检查
        .route("/health", get(super::handlers::health_check))
        .with_state(hosts)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
