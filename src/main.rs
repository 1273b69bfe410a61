use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use powledger::api::{self, AppState};
use powledger::config::NodeConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();
    let state = web::Data::new(AppState::from_config(&config));

    info!(
        "starting powledger node {}/{} at http://{}:{} ({} workers, {:?} policy)",
        config.cluster.rank,
        config.cluster.size,
        config.host,
        config.port,
        state.workers,
        config.policy
    );

    let (host, port) = (config.host.clone(), config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
