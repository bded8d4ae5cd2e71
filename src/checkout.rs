//! Checkout flow
//!
//! Captures payment through the gateway, then provisions a course account
//! and sends a credentials/receipt email. Provisioning and email problems
//! after a captured payment are reported in the response booleans, never as
//! a failed purchase. Test mode skips the gateway entirely and fabricates a
//! synthetic intent id, so the provisioning and email paths get exercised
//! without a real charge.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthProvider;
use crate::db;
use crate::error::{Error, Result};
use crate::mailer::Mailer;

/// Prefix on synthetic payment intent ids produced in test mode
pub const TEST_INTENT_PREFIX: &str = "pi_test_";

/// Incoming create-payment request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    #[serde(default)]
    pub payment_method_id: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
}

/// Outcome reported to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub payment_intent_id: String,
    pub user_created: bool,
    pub email_sent: bool,
    pub test_mode: bool,
}

/// Payment capture seam
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Capture a payment; returns the provider's payment intent id
    async fn charge(
        &self,
        payment_method_id: &str,
        amount: i64,
        currency: &str,
        description: &str,
    ) -> Result<String>;
}

/// Stripe-style gateway client
pub struct StripeGateway {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: "https://api.stripe.com/v1/payment_intents".to_string(),
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(
        &self,
        payment_method_id: &str,
        amount: i64,
        currency: &str,
        description: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.to_string()),
                ("currency", currency.to_string()),
                ("payment_method", payment_method_id.to_string()),
                ("confirm", "true".to_string()),
                ("description", description.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("payment gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "payment gateway returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("payment gateway response unreadable: {}", e)))?;

        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Upstream("payment gateway response missing id".to_string()))
    }
}

/// Orchestrates charge, provisioning, and notification
pub struct CheckoutService {
    db: Pool<Sqlite>,
    gateway: Arc<dyn PaymentGateway>,
    provider: Arc<dyn AuthProvider>,
    mailer: Arc<dyn Mailer>,
}

impl CheckoutService {
    pub fn new(
        db: Pool<Sqlite>,
        gateway: Arc<dyn PaymentGateway>,
        provider: Arc<dyn AuthProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            gateway,
            provider,
            mailer,
        }
    }

    pub async fn purchase(&self, request: ChargeRequest) -> Result<CheckoutOutcome> {
        if request.customer_email.trim().is_empty() {
            return Err(Error::Validation("customerEmail is required".to_string()));
        }
        if request.amount <= 0 {
            return Err(Error::Validation("amount must be positive".to_string()));
        }

        let currency = request.currency.as_deref().unwrap_or("usd");
        let product = request
            .product_name
            .as_deref()
            .unwrap_or("Course access")
            .to_string();

        let payment_intent_id = if request.test_mode {
            let id = format!("{}{}", TEST_INTENT_PREFIX, Uuid::new_v4().simple());
            info!("Test-mode checkout, skipping payment capture: {}", id);
            id
        } else {
            let method = request
                .payment_method_id
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .ok_or_else(|| {
                    Error::Validation("paymentMethodId is required".to_string())
                })?;
            self.gateway
                .charge(method, request.amount, currency, &product)
                .await?
        };

        let email = request.customer_email.trim();
        let temp_password = generate_temp_password();

        let user_created = match self.provider.create_user(email, &temp_password).await {
            Ok(_) => {
                if let Err(e) = self.provider.grant_access(email).await {
                    warn!("Access grant failed for {} after payment {}: {}", email, payment_intent_id, e);
                }
                if let Err(e) = self.mirror_account(email, &temp_password).await {
                    warn!("Local account mirror failed for {}: {}", email, e);
                }
                info!("Provisioned account for {} ({})", email, payment_intent_id);
                true
            }
            Err(e) => {
                // The payment is already captured; report, do not fail.
                warn!(
                    "Account provisioning failed for {} after payment {}: {}",
                    email, payment_intent_id, e
                );
                false
            }
        };

        let email_sent = match self
            .mailer
            .send(
                email,
                &format!("Your {} purchase", product),
                &receipt_body(
                    &request.customer_name,
                    email,
                    &temp_password,
                    &payment_intent_id,
                    request.amount,
                    currency,
                    user_created,
                ),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                // Deliberately swallowed: a completed purchase is never
                // failed over a notification email.
                warn!("Receipt email to {} failed: {}", email, e);
                false
            }
        };

        Ok(CheckoutOutcome {
            payment_intent_id,
            user_created,
            email_sent,
            test_mode: request.test_mode,
        })
    }

    async fn mirror_account(&self, email: &str, password: &str) -> Result<()> {
        db::users::upsert_remote_snapshot(&self.db, email, true, false, None).await?;
        db::users::cache_password(&self.db, email, password).await
    }
}

fn generate_temp_password() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(12);
    token
}

fn receipt_body(
    name: &str,
    email: &str,
    temp_password: &str,
    payment_intent_id: &str,
    amount: i64,
    currency: &str,
    user_created: bool,
) -> String {
    let greeting = if name.trim().is_empty() { "there" } else { name };
    let credentials = if user_created {
        format!(
            "Your login: {}\nTemporary password: {}\nPlease change it after your first sign-in.\n",
            email, temp_password
        )
    } else {
        "Your account could not be created automatically; support will follow up.\n".to_string()
    };
    format!(
        "Hi {},\n\nThanks for your purchase.\n\n{}\nReceipt: {} {} {} ({})\n",
        greeting,
        credentials,
        amount,
        currency,
        payment_intent_id,
        chrono::Utc::now().format("%Y-%m-%d")
    )
}
