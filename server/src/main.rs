use actix_cors::Cors;
use actix_web::{App, HttpServer};

use sketchroom_server::config::ServerConfig;
use sketchroom_server::handlers::root;
use sketchroom_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env();
    let srv_tx = spawn_server(config.channel_capacity);
    let bind = config.bind.clone();
    log::info!("Relay listening on {}", bind);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .data(srv_tx.clone())
            .data(config.clone())
            .configure(root)
    })
    .bind(bind)?
    .run()
    .await
}
