use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use log::info;

use super::models::{AcceptResponse, AppState, ChainResponse, ValidateResponse};
use crate::blockchain::{Block, validate_chain};

/// Get the full chain in wire encoding.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.store.snapshot();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: state.store.next_difficulty(),
        chain,
    })
}

/// Validate the local chain.
#[get("/validate/")]
pub async fn validate(state: web::Data<AppState>) -> impl Responder {
    let chain = state.store.snapshot();
    HttpResponse::Ok().json(ValidateResponse {
        valid: validate_chain(&chain, Utc::now().timestamp()).is_ok(),
        length: chain.len(),
    })
}

/// Receive a single block from a peer and append it. Malformed payloads are
/// rejected by deserialization before they reach the store.
#[post("/block/")]
pub async fn post_block(state: web::Data<AppState>, body: web::Json<Block>) -> impl Responder {
    let block = body.into_inner();
    info!("PEER - received block #{}", block.index);
    match state.store.append(block) {
        Ok(()) => HttpResponse::Ok().json(AcceptResponse::ok()),
        Err(reason) => HttpResponse::BadRequest().json(AcceptResponse::rejected(reason)),
    }
}

/// Receive a whole candidate chain from a peer and apply the fork-choice
/// rule: replace only if it validates and is strictly heavier.
#[post("/chain/")]
pub async fn post_chain(state: web::Data<AppState>, body: web::Json<Vec<Block>>) -> impl Responder {
    let chain = body.into_inner();
    info!("PEER - received chain with {} blocks", chain.len());
    match state.store.replace(chain) {
        Ok(()) => HttpResponse::Ok().json(AcceptResponse::ok()),
        Err(reason) => HttpResponse::BadRequest().json(AcceptResponse::rejected(reason)),
    }
}
