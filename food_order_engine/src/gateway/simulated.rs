use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use log::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::GatewayConfig,
    db_types::PaymentMethod,
    gateway::{ChargeRequest, GatewayError, GatewayReceipt, PaymentGateway, RefundRequest},
};

/// A stand-in for a real payment network. Every request succeeds with probability `success_rate`.
///
/// Only [`PaymentMethod::Balance`] is wired through. Seed the gateway for reproducible outcomes.
#[derive(Clone)]
pub struct SimulatedGateway {
    success_rate: f64,
    latency: Duration,
    rng: Arc<Mutex<StdRng>>,
}

impl std::fmt::Debug for SimulatedGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulatedGateway(success_rate={}, latency={:?})", self.success_rate, self.latency)
    }
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        Self::with_rng(success_rate, StdRng::from_entropy())
    }

    pub fn seeded(success_rate: f64, seed: u64) -> Self {
        Self::with_rng(success_rate, StdRng::seed_from_u64(seed))
    }

    pub fn always_succeeds() -> Self {
        Self::seeded(1.0, 0)
    }

    pub fn always_fails() -> Self {
        Self::seeded(0.0, 0)
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seeded(config.success_rate, seed),
            None => Self::new(config.success_rate),
        }
    }

    /// Makes every call wait for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    fn with_rng(success_rate: f64, rng: StdRng) -> Self {
        let success_rate = if success_rate.is_nan() { 0.0 } else { success_rate.clamp(0.0, 1.0) };
        Self { success_rate, latency: Duration::ZERO, rng: Arc::new(Mutex::new(rng)) }
    }

    async fn flip(&self, reference: &str) -> Result<GatewayReceipt, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let success = match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.success_rate),
            Err(_) => return Err(GatewayError::Unavailable("random source is poisoned".into())),
        };
        if success {
            Ok(GatewayReceipt { reference: reference.to_string(), processed_at: Utc::now() })
        } else {
            Err(GatewayError::Declined(format!("simulated decline for {reference}")))
        }
    }
}

impl PaymentGateway for SimulatedGateway {
    fn processor_type(&self) -> &str {
        "simulated"
    }

    fn supports(&self, method: PaymentMethod) -> bool {
        method == PaymentMethod::Balance
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError> {
        if !self.supports(request.method) {
            return Err(GatewayError::UnsupportedMethod(request.method));
        }
        trace!("💰️ Simulating charge of {} for {}", request.amount, request.transaction_id);
        self.flip(&request.transaction_id).await
    }

    async fn refund(&self, request: &RefundRequest) -> Result<GatewayReceipt, GatewayError> {
        if !self.supports(request.method) {
            return Err(GatewayError::UnsupportedMethod(request.method));
        }
        trace!(
            "💸️ Simulating refund of {} against {} ({})",
            request.amount,
            request.original_transaction_id,
            request.refund_transaction_id
        );
        self.flip(&request.refund_transaction_id).await
    }
}
