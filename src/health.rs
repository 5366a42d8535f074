use std::net::SocketAddr;

use actix_web::dev::ServerHandle;
use actix_web::{get, middleware, web, App, HttpResponse, HttpServer, Responder};
use tracing::info;

use crate::types::ServiceInfo;

#[get("/")]
async fn root(info: web::Data<ServiceInfo>) -> impl Responder {
    web::Json(info.health())
}

#[get("/health")]
async fn health(info: web::Data<ServiceInfo>) -> impl Responder {
    web::Json(info.health())
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().finish()
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(root)
        .service(health)
        .default_service(web::to(not_found));
}

/// Binds the liveness server and spawns it; it lives as long as the process.
pub fn spawn(addr: SocketAddr, info: ServiceInfo) -> std::io::Result<ServerHandle> {
    let data = web::Data::new(info);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default().exclude("/").exclude("/health"))
            .configure(routes)
    })
    .bind(addr)?
    .workers(1)
    .disable_signals()
    .run();

    let handle = server.handle();
    actix_web::rt::spawn(server);
    info!(%addr, "health server listening");
    Ok(handle)
}
