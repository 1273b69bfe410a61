use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

/// Node summary: chain length, next difficulty, chain weight, plus the
/// node's mining and cluster configuration.
#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let summary = state.store.summary();
    HttpResponse::Ok().json(StatsResponse {
        length: summary.length,
        difficulty: summary.difficulty,
        weight: summary.weight,
        policy: format!("{:?}", state.policy),
        workers: state.workers,
        rank: state.cluster.rank,
        cluster_size: state.cluster.size,
    })
}
