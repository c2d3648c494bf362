use crate::admin::AdminCommand;
use crate::room::RoomDescription;
use crate::server::{ServerCommand, ServerTx};
use actix_web::error;
use actix_web::web::{self, HttpResponse};
use actix_web::Responder;
use actix_web::Result;

pub fn configure_room_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/rooms").route(web::get().to(list_rooms)));
}

async fn list_rooms(srv_tx: web::Data<ServerTx>) -> Result<impl Responder> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Vec<RoomDescription>>();

    srv_tx
        .get_ref()
        .clone()
        .send(ServerCommand::Admin(AdminCommand::ListRooms { tx }))
        .await
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;

    let rooms = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;

    Ok(HttpResponse::Ok().json(rooms))
}
