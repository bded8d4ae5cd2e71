//! Checkout endpoint

use axum::extract::State;
use tracing::{error, info};

use crate::api::extract::Json;
use crate::checkout::{ChargeRequest, CheckoutOutcome};
use crate::error::Result;
use crate::AppState;

/// POST /api/checkout - Capture payment and provision the account
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<ChargeRequest>,
) -> Result<Json<CheckoutOutcome>> {
    match state.checkout.purchase(request).await {
        Ok(outcome) => {
            info!(
                "Checkout complete: {} (userCreated={}, emailSent={})",
                outcome.payment_intent_id, outcome.user_created, outcome.email_sent
            );
            Ok(Json(outcome))
        }
        Err(e) => {
            error!("Checkout failed: {}", e);
            Err(e)
        }
    }
}
