use crate::server::ServerRouter;
use axum::Router;

mod api;
mod html;

pub fn routes() -> ServerRouter {
    Router::new().merge(api::routes()).merge(html::routes())
}
