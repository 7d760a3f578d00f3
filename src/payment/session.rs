use crate::clock::Clock;
use crate::error::{PaymentError, WalletError};
use crate::execution::{Erc20, NonceManager, RpcClient, TransactionBuilder};
use crate::models::QrPayload;
use crate::payment::amount::{check_ceiling, decimal_to_units, AmountCheck};
use crate::swap::{SwapPlan, SwapPlanner};
use alloy_primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Every state the session record can occupy. Named exactly as the
/// conversational flow: purchase-concept, QR, amount, prepare, confirm,
/// execute, report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    AwaitingConcept,
    AwaitingQR,
    QRScanned,
    AwaitingAmount,
    AmountSet,
    Prepared,
    AwaitingConfirmation,
    Executing,
    Confirmed,
    Failed,
    Cancelled,
}

impl PaymentState {
    fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Confirmed | PaymentState::Failed | PaymentState::Cancelled)
    }
}

/// The conversational payment record: current state plus every field the
/// flow accumulates along the way — merchant address, amount, purchase
/// concept, whether a top-up swap is needed and its plan, the broadcast
/// tx hash, and the last error.
#[derive(Debug, Clone, Default)]
pub struct PaymentSession {
    pub state: PaymentState,
    pub merchant_address: Option<Address>,
    pub amount_units: Option<U256>,
    pub concept: Option<String>,
    pub needs_swap: Option<bool>,
    pub swap_plan: Option<SwapPlan>,
    pub tx_hash: Option<[u8; 32]>,
    pub error: Option<String>,
    /// USDC received by the top-up swap, if one ran. Measured as a
    /// pre/post `balanceOf` delta around the swap broadcast — the
    /// receipt decoder here doesn't parse logs, so this is the fallback
    /// path rather than a `Transfer` event read.
    pub swap_amount_out: Option<U256>,
}

impl Default for PaymentState {
    fn default() -> Self {
        PaymentState::Idle
    }
}

impl PaymentSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal states reset to `Idle` on the next tool call; callers must
    /// invoke this before processing any incoming tool call.
    pub fn reset_if_terminal(&mut self) {
        if self.state.is_terminal() {
            *self = PaymentSession::new();
        }
    }
}

/// Wires the session's data to the components that actually do the work:
/// balance reads, swap planning, and transaction broadcast. One engine per
/// wallet; the session itself holds no I/O handles.
pub struct PaymentEngine {
    pub rpc: Arc<RpcClient>,
    pub nonce_manager: Arc<NonceManager>,
    pub tx_builder: Arc<TransactionBuilder>,
    pub erc20: Arc<Erc20>,
    pub swap_planner: Arc<SwapPlanner>,
    pub clock: Arc<dyn Clock>,
    pub own_address: Address,
    pub usdc_address: Address,
    pub wrapped_native_address: Address,
    pub safety_ceiling_usd: f64,
    pub warning_band_multiplier: f64,
    pub default_slippage_bps: u32,
    pub swap_deadline_minutes: i64,
    /// Flat gas reserve (wei) withheld from native balance when sizing a
    /// top-up swap, covering the swap's own transaction fee.
    pub swap_gas_reserve_wei: U256,
}

pub enum PrepareOutcome {
    Prepared,
    Warning(String),
}

impl PaymentEngine {
    pub fn set_purchase_concept(&self, session: &mut PaymentSession, concept: String) -> Result<(), PaymentError> {
        session.reset_if_terminal();
        if session.state != PaymentState::Idle {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }
        session.concept = Some(concept);
        session.state = PaymentState::AwaitingConcept;
        Ok(())
    }

    pub fn scan_qr(&self, session: &mut PaymentSession) -> Result<(), PaymentError> {
        session.reset_if_terminal();
        if session.state != PaymentState::AwaitingConcept {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }
        session.state = PaymentState::AwaitingQR;
        Ok(())
    }

    /// Called once the external QR-decoding producer yields a payload.
    pub fn qr_detected(&self, session: &mut PaymentSession, payload: QrPayload) -> Result<(), PaymentError> {
        session.reset_if_terminal();
        if session.state != PaymentState::AwaitingQR {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }
        session.state = PaymentState::QRScanned;
        session.merchant_address = Some(payload.merchant);

        session.state = match payload.amount_units {
            Some(units) => {
                session.amount_units = Some(U256::from(units));
                PaymentState::AmountSet
            }
            None => PaymentState::AwaitingAmount,
        };
        Ok(())
    }

    pub fn set_payment_amount(&self, session: &mut PaymentSession, amount_usd: Decimal) -> Result<(), PaymentError> {
        session.reset_if_terminal();
        if session.state != PaymentState::AwaitingAmount {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }
        self.apply_amount(session, amount_usd)?;
        session.state = PaymentState::AmountSet;
        Ok(())
    }

    fn apply_amount(&self, session: &mut PaymentSession, amount_usd: Decimal) -> Result<AmountCheck, PaymentError> {
        let amount_f64: f64 = amount_usd
            .to_f64()
            .ok_or_else(|| PaymentError::InvalidAmount(format!("amount out of range: {amount_usd}")))?;
        let check = check_ceiling(amount_f64, self.safety_ceiling_usd, self.warning_band_multiplier)?;
        session.amount_units = Some(decimal_to_units(amount_usd)?);
        Ok(check)
    }

    /// Balance-reads USDC, decides whether a native->USDC top-up swap is
    /// needed, and plans it if so. If the agent supplies an amount that
    /// differs from one already set via `set_payment_amount`, the new
    /// amount is authoritative and the session re-enters `AmountSet` first.
    pub async fn prepare_payment(
        &self,
        session: &mut PaymentSession,
        merchant_wallet: Address,
        amount_usd: Decimal,
    ) -> Result<PrepareOutcome, PaymentError> {
        session.reset_if_terminal();
        if !matches!(session.state, PaymentState::AmountSet | PaymentState::Prepared | PaymentState::AwaitingConfirmation) {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }

        session.state = PaymentState::AmountSet;
        session.merchant_address = Some(merchant_wallet);
        let check = self.apply_amount(session, amount_usd)?;

        let amount_units = session.amount_units.expect("just set above");

        let usdc_balance = self
            .erc20
            .balance_of(self.usdc_address, self.own_address)
            .await
            .map_err(PaymentError::Wallet)?;

        if usdc_balance >= amount_units {
            session.needs_swap = Some(false);
            session.swap_plan = None;
        } else {
            let shortfall = amount_units - usdc_balance;
            let shortfall_u128: u128 = shortfall.try_into().map_err(|_| {
                PaymentError::InvalidAmount("shortfall does not fit in u128".into())
            })?;

            let native_balance = self
                .rpc
                .native_balance(self.own_address)
                .await
                .map_err(PaymentError::Wallet)?;
            let available = native_balance.saturating_sub(self.swap_gas_reserve_wei);

            let estimated_native_in = self
                .swap_planner
                .estimate_input_for_target_output(
                    self.wrapped_native_address,
                    self.usdc_address,
                    shortfall_u128,
                )
                .await
                .map_err(PaymentError::Wallet)?;

            if available < U256::from(estimated_native_in) {
                return Err(PaymentError::InsufficientFunds);
            }

            let plan = self
                .swap_planner
                .plan(
                    self.wrapped_native_address,
                    self.usdc_address,
                    estimated_native_in,
                    self.own_address,
                    self.default_slippage_bps,
                    self.clock.now(),
                    self.swap_deadline_minutes,
                )
                .await
                .map_err(PaymentError::Wallet)?;

            session.needs_swap = Some(true);
            session.swap_plan = Some(plan);
        }

        session.state = PaymentState::Prepared;
        session.state = PaymentState::AwaitingConfirmation;

        match check {
            AmountCheck::Ok => Ok(PrepareOutcome::Prepared),
            AmountCheck::Warning => Ok(PrepareOutcome::Warning(format!(
                "{amount_usd} exceeds the usual safety ceiling; confirm to proceed"
            ))),
        }
    }

    /// The one atomic user authorization: broadcasts the swap (if planned),
    /// waits for its receipt, then broadcasts the USDC transfer.
    ///
    /// `cancel_requested` is the dispatcher's cancellation side-channel: a
    /// `cancel_payment` call that arrives while this is in flight can't
    /// take the session lock this holds, so it flips that flag instead.
    /// `execute` polls it between broadcasts rather than only at entry, so
    /// a cancellation that lands after the swap confirms but before the
    /// transfer is signed still takes effect — it never queues behind the
    /// transfer going out.
    pub async fn confirm_payment(
        &self,
        session: &mut PaymentSession,
        cancel_requested: &AtomicBool,
    ) -> Result<[u8; 32], PaymentError> {
        session.reset_if_terminal();
        if session.state != PaymentState::AwaitingConfirmation {
            return Err(PaymentError::InvalidState(format!("{:?}", session.state)));
        }
        if session.amount_units.is_none() {
            return Err(PaymentError::InvalidState("missing amount".into()));
        }

        cancel_requested.store(false, Ordering::Release);
        session.state = PaymentState::Executing;

        let result = self.execute(session, cancel_requested).await;
        match &result {
            Ok(hash) => {
                session.tx_hash = Some(*hash);
                session.state = PaymentState::Confirmed;
                info!("payment confirmed: {}", hex::encode(hash));
            }
            Err(PaymentError::Cancelled) => {
                session.state = PaymentState::Cancelled;
                info!("payment cancelled mid-flight");
            }
            Err(e) => {
                session.error = Some(e.to_string());
                session.state = PaymentState::Failed;
                warn!("payment failed: {e}");
            }
        }
        result
    }

    async fn execute(
        &self,
        session: &mut PaymentSession,
        cancel_requested: &AtomicBool,
    ) -> Result<[u8; 32], PaymentError> {
        if cancel_requested.swap(false, Ordering::AcqRel) {
            return Err(PaymentError::Cancelled);
        }

        if let Some(plan) = session.swap_plan.clone() {
            let usdc_before = self
                .erc20
                .balance_of(self.usdc_address, self.own_address)
                .await
                .map_err(PaymentError::Wallet)?;

            let built = self
                .tx_builder
                .build(plan.to, plan.value, plan.call_data)
                .await
                .map_err(PaymentError::Wallet)?;
            let swap_hash = self.tx_builder.broadcast(&built).await.map_err(PaymentError::Wallet)?;
            session.tx_hash = Some(swap_hash);
            let swap_receipt = self.tx_builder.wait_for_receipt(&swap_hash).await.map_err(PaymentError::Wallet)?;
            if !swap_receipt.success {
                return Err(PaymentError::Wallet(WalletError::Reverted {
                    block: swap_receipt.block_number,
                    gas_used: swap_receipt.gas_used,
                }));
            }
            self.nonce_manager.reset();

            let usdc_after = self
                .erc20
                .balance_of(self.usdc_address, self.own_address)
                .await
                .map_err(PaymentError::Wallet)?;
            session.swap_amount_out = Some(usdc_after.saturating_sub(usdc_before));

            // Cancellation between the swap receipt and the transfer broadcast
            // is the one window where interrupting still leaves the session in
            // a sane state: tx1 is settled on-chain, tx2 was never signed.
            if cancel_requested.swap(false, Ordering::AcqRel) {
                return Err(PaymentError::Cancelled);
            }
        }

        let merchant = session.merchant_address.ok_or(PaymentError::InvalidState("no merchant".into()))?;
        let amount = session.amount_units.ok_or(PaymentError::InvalidState("no amount".into()))?;
        let call_data = Erc20::encode_transfer(merchant, amount);

        let built = self
            .tx_builder
            .build(self.usdc_address, U256::ZERO, call_data)
            .await
            .map_err(PaymentError::Wallet)?;
        let transfer_hash = self.tx_builder.broadcast(&built).await.map_err(PaymentError::Wallet)?;
        let receipt = self
            .tx_builder
            .wait_for_receipt(&transfer_hash)
            .await
            .map_err(PaymentError::Wallet)?;

        if !receipt.success {
            return Err(PaymentError::Wallet(WalletError::Reverted {
                block: receipt.block_number,
                gas_used: receipt.gas_used,
            }));
        }

        self.nonce_manager.reset();
        Ok(transfer_hash)
    }

    /// Terminates in-flight waiting; cannot recall a broadcast transaction
    /// already in the mempool. A tx hash already recorded survives into
    /// `Cancelled` for observability.
    pub fn cancel_payment(&self, session: &mut PaymentSession) {
        if !session.state.is_terminal() {
            session.state = PaymentState::Cancelled;
        } else {
            *session = PaymentSession::new();
        }
        self.nonce_manager.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reset_to_idle() {
        let mut session = PaymentSession::new();
        session.state = PaymentState::Confirmed;
        session.tx_hash = Some([1u8; 32]);
        session.reset_if_terminal();
        assert_eq!(session.state, PaymentState::Idle);
        assert!(session.tx_hash.is_none());
    }

    #[test]
    fn non_terminal_state_is_untouched_by_reset() {
        let mut session = PaymentSession::new();
        session.state = PaymentState::AmountSet;
        session.reset_if_terminal();
        assert_eq!(session.state, PaymentState::AmountSet);
    }
}
