use std::sync::atomic::AtomicBool;

use actix_web::{HttpResponse, Responder, post, web};
use log::warn;

use super::models::{AcceptResponse, AppState, MineRequest, MineResponse};
use crate::blockchain::Block;
use crate::miner::{MineError, SearchPlan, mine};

/// Mine the next block carrying the request's payload and append it.
/// The chain lock is never held during the search: the template is built
/// from a snapshot of the tip, and the sealed block goes through the same
/// validate-then-append path as a peer block.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let tip = state.store.latest();
    let difficulty = state.store.next_difficulty();
    let template = Block::template(
        tip.index + 1,
        req.into_inner().data,
        tip.hash.clone(),
        difficulty,
    );
    let plan = SearchPlan::clustered(state.workers, state.cluster.rank, state.cluster.size);
    let stop = AtomicBool::new(false);

    match mine(&template, &plan, &stop) {
        Ok(outcome) => match state.store.append(outcome.block.clone()) {
            Ok(()) => HttpResponse::Ok().json(MineResponse {
                mined_index: outcome.block.index,
                hash: outcome.block.hash,
                nonce: outcome.block.nonce,
                difficulty,
                mining_time_secs: outcome.elapsed.as_secs_f64(),
                hashes: outcome.hashes,
                hash_rate: outcome.hash_rate,
            }),
            Err(reason) => {
                // the tip moved while we were searching (peer block adopted)
                warn!("MINER - sealed block no longer fits the chain: {}", reason);
                HttpResponse::Conflict().json(AcceptResponse::rejected(reason))
            }
        },
        // distinct from a rejected block: the round itself failed
        Err(err @ MineError::Exhausted { .. }) => {
            HttpResponse::UnprocessableEntity().json(AcceptResponse::rejected(err))
        }
        Err(err @ MineError::Stopped) => {
            HttpResponse::Conflict().json(AcceptResponse::rejected(err))
        }
    }
}
