use actix_web::{get, post, web, HttpResponse, Result as WebResult};
use std::sync::Arc;
use tracing::error;

use crate::api::models::{ErrorBody, ListenResponse, PayRequest, PayResponse};
use crate::runner::speech::SpeechToText;
use crate::transcript::TranscriptStore;
use crate::wallet::WalletVault;

/// Full transcript, verbatim. An absent log file reads as an empty body.
#[get("/api/log")]
pub async fn get_log(store: web::Data<Arc<TranscriptStore>>) -> WebResult<HttpResponse> {
    match store.read_all() {
        Ok(text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(text)),
        Err(e) => {
            error!("failed to read transcript: {e}");
            Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e.to_string())))
        }
    }
}

/// Blocks until the offline STT collaborator produces a transcription.
#[get("/api/listen")]
pub async fn listen(stt: web::Data<Arc<SpeechToText>>) -> WebResult<HttpResponse> {
    match stt.listen().await {
        Ok(text) => Ok(HttpResponse::Ok().json(ListenResponse { text })),
        Err(e) => {
            error!("speech-to-text failed: {e}");
            Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e.to_string())))
        }
    }
}

/// Decrypts the wallet blob for this request only; nothing is cached.
#[get("/api/wallet/balance")]
pub async fn wallet_balance(vault: web::Data<Arc<WalletVault>>) -> WebResult<HttpResponse> {
    match vault.open_snapshot() {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        Err(e) => {
            error!("wallet decryption failed: {e}");
            Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e.to_string())))
        }
    }
}

#[post("/api/lightning/pay")]
pub async fn lightning_pay(
    vault: web::Data<Arc<WalletVault>>,
    req: web::Json<PayRequest>,
) -> WebResult<HttpResponse> {
    let invoice = match req.into_inner().invoice.filter(|i| !i.trim().is_empty()) {
        Some(invoice) => invoice,
        None => {
            return Ok(
                HttpResponse::BadRequest().json(ErrorBody::new("Missing invoice parameter"))
            )
        }
    };

    match vault.pay(&invoice) {
        Ok(result) => Ok(HttpResponse::Ok().json(PayResponse { result })),
        Err(e) => {
            error!("simulated payment failed: {e}");
            Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e.to_string())))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_log)
        .service(listen)
        .service(wallet_balance)
        .service(lightning_pay)
        .service(crate::api::stream::stream_chat);
}
