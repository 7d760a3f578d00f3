use crate::error::PaymentError;
use crate::models::qr::parse_qr_payload;
use crate::payment::{PaymentEngine, PaymentSession, PrepareOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// The fixed tool surface exposed to the voice agent. Field names match
/// the voice layer's JSON tool-call wire format verbatim.
#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolCall {
    SetPurchaseConcept { concept: String },
    ScanQr,
    /// Internal bridge event: the glasses transport decoded a QR payload.
    /// Not part of the agent-facing tool list in the strict sense, but
    /// routed through the same dispatcher so session state stays
    /// single-threaded.
    QrDetected { payload: String },
    SetPaymentAmount { amount_usd: f64 },
    PreparePayment {
        merchant_wallet: String,
        amount_usd: f64,
        #[serde(default)]
        merchant_name: Option<String>,
    },
    ConfirmPayment,
    CancelPayment,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub ok: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
}

impl ToolResponse {
    fn ok(status: &str) -> Self {
        Self {
            ok: true,
            status: status.into(),
            message: None,
            tx_hash: None,
        }
    }

    fn ok_with_hash(status: &str, hash: [u8; 32]) -> Self {
        Self {
            ok: true,
            status: status.into(),
            message: None,
            tx_hash: Some(format!("0x{}", hex::encode(hash))),
        }
    }

    fn ok_with_message(status: &str, message: String) -> Self {
        Self {
            ok: true,
            status: status.into(),
            message: Some(message),
            tx_hash: None,
        }
    }

    fn err(status: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: status.into(),
            message: Some(message.into()),
            tx_hash: None,
        }
    }
}

/// Routes agent-emitted tool calls into the payment state machine. Single
/// in-flight call per session: a call that arrives while another is still
/// running is rejected with `busy`, not queued — matching the "the wallet
/// engine is not re-entrant on the same key" constraint. `cancel_payment`
/// is the one exception: it never queues behind `busy`, since a user
/// needs to be able to interrupt a confirmation that's already broadcasting.
pub struct ToolDispatcher {
    engine: Arc<PaymentEngine>,
    session: Mutex<PaymentSession>,
    busy: AtomicBool,
    /// Set by a `cancel_payment` that arrives while another call holds
    /// `busy` and therefore the session lock too. `confirm_payment` polls
    /// this between broadcasts instead of the caller waiting on the lock,
    /// so cancellation can preempt an in-flight confirmation.
    cancel_requested: AtomicBool,
}

impl ToolDispatcher {
    pub fn new(engine: Arc<PaymentEngine>) -> Self {
        Self {
            engine,
            session: Mutex::new(PaymentSession::new()),
            busy: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub async fn handle(&self, call: ToolCall) -> ToolResponse {
        // `cancel_payment` gets a privileged path: if another call is
        // already in flight (and therefore holding the session lock),
        // don't queue behind it — flag the cancellation and let the
        // running `confirm_payment` observe it between broadcasts.
        if matches!(call, ToolCall::CancelPayment) && self.busy.load(Ordering::Acquire) {
            self.cancel_requested.store(true, Ordering::Release);
            return ToolResponse::ok("cancel-requested");
        }

        if self.busy.swap(true, Ordering::AcqRel) {
            return ToolResponse::err("busy", "a tool call is already in flight");
        }

        let response = self.dispatch(call).await;
        self.busy.store(false, Ordering::Release);
        response
    }

    async fn dispatch(&self, call: ToolCall) -> ToolResponse {
        let mut session = self.session.lock().await;

        match call {
            ToolCall::SetPurchaseConcept { concept } => {
                match self.engine.set_purchase_concept(&mut session, concept) {
                    Ok(()) => ToolResponse::ok("awaiting-concept"),
                    Err(e) => invalid_state_response(e),
                }
            }
            ToolCall::ScanQr => match self.engine.scan_qr(&mut session) {
                Ok(()) => ToolResponse::ok("awaiting-qr"),
                Err(e) => invalid_state_response(e),
            },
            ToolCall::QrDetected { payload } => match parse_qr_payload(&payload) {
                Ok(decoded) => match self.engine.qr_detected(&mut session, decoded) {
                    Ok(()) => ToolResponse::ok(status_for(&session)),
                    Err(e) => invalid_state_response(e),
                },
                Err(e) => ToolResponse::err("invalid-address", e.to_string()),
            },
            ToolCall::SetPaymentAmount { amount_usd } => match to_decimal(amount_usd) {
                Ok(amount) => match self.engine.set_payment_amount(&mut session, amount) {
                    Ok(()) => ToolResponse::ok("amount-set"),
                    Err(e) => invalid_state_response(e),
                },
                Err(e) => invalid_state_response(e),
            },
            ToolCall::PreparePayment {
                merchant_wallet,
                amount_usd,
                merchant_name: _,
            } => self.handle_prepare(&mut session, &merchant_wallet, amount_usd).await,
            ToolCall::ConfirmPayment => {
                match self.engine.confirm_payment(&mut session, &self.cancel_requested).await {
                    Ok(hash) => ToolResponse::ok_with_hash("confirmed", hash),
                    Err(PaymentError::Cancelled) => ToolResponse::ok("cancelled"),
                    Err(e) => invalid_state_response(e),
                }
            }
            ToolCall::CancelPayment => {
                self.engine.cancel_payment(&mut session);
                ToolResponse::ok("cancelled")
            }
        }
    }

    async fn handle_prepare(
        &self,
        session: &mut PaymentSession,
        merchant_wallet: &str,
        amount_usd: f64,
    ) -> ToolResponse {
        let address = match merchant_wallet.parse() {
            Ok(a) => a,
            Err(_) => {
                return ToolResponse::err("invalid-address", format!("bad merchant address: {merchant_wallet}"))
            }
        };
        let amount = match to_decimal(amount_usd) {
            Ok(a) => a,
            Err(e) => return invalid_state_response(e),
        };

        match self.engine.prepare_payment(session, address, amount).await {
            Ok(PrepareOutcome::Prepared) => ToolResponse::ok("prepared"),
            Ok(PrepareOutcome::Warning(message)) => {
                warn!("{message}");
                ToolResponse::ok_with_message("prepared", message)
            }
            Err(e) => invalid_state_response(e),
        }
    }
}

fn to_decimal(amount_usd: f64) -> Result<Decimal, PaymentError> {
    Decimal::try_from(amount_usd)
        .map_err(|_| PaymentError::InvalidAmount(format!("not representable: {amount_usd}")))
}

fn invalid_state_response(e: PaymentError) -> ToolResponse {
    ToolResponse::err(e.status(), e.to_string())
}

fn status_for(session: &PaymentSession) -> &'static str {
    match session.state {
        crate::payment::PaymentState::Idle => "idle",
        crate::payment::PaymentState::AwaitingConcept => "awaiting-concept",
        crate::payment::PaymentState::AwaitingQR => "awaiting-qr",
        crate::payment::PaymentState::QRScanned => "qr-scanned",
        crate::payment::PaymentState::AwaitingAmount => "awaiting-amount",
        crate::payment::PaymentState::AmountSet => "amount-set",
        crate::payment::PaymentState::Prepared => "prepared",
        crate::payment::PaymentState::AwaitingConfirmation => "awaiting-confirmation",
        crate::payment::PaymentState::Executing => "executing",
        crate::payment::PaymentState::Confirmed => "confirmed",
        crate::payment::PaymentState::Failed => "failed",
        crate::payment::PaymentState::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_deserializes_from_tagged_json() {
        let json = r#"{"tool":"set_purchase_concept","args":{"concept":"coffee"}}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        assert!(matches!(call, ToolCall::SetPurchaseConcept { concept } if concept == "coffee"));
    }

    #[test]
    fn confirm_payment_has_no_args() {
        let json = r#"{"tool":"confirm_payment"}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        assert!(matches!(call, ToolCall::ConfirmPayment));
    }

    #[test]
    fn response_omits_null_fields() {
        let resp = ToolResponse::ok("idle");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("message"));
        assert!(!json.contains("txHash"));
    }
}
