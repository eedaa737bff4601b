#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use confirmations_net::{NetworkClient, NetworkError, UrlRequest, UrlResponse};
use redemption_sdk::{
    AdType, Clock, ConfirmationType, MemoryPrefStore, MemoryTokenStore, PrefStore,
    RedemptionConfig, RedemptionDelegate, RedemptionError, RedemptionScheduler, SchedulerContext,
    TokenStore, TotalsUserDataBuilder, UnblindedPaymentToken, WalletInfo, NEXT_TOKEN_REDEMPTION_AT_PREF,
};
use tokio::sync::{mpsc, Semaphore};

pub const PAYMENT_ID: &str = "c387c2d8-a26d-4451-83e4-5c0c6fd942be";

pub fn wallet() -> WalletInfo {
    WalletInfo::new(PAYMENT_ID, STANDARD.encode([7u8; 32]))
}

/// Well-formed token: 64-byte preimage followed by a 32-byte point
pub fn token(fill: u8) -> UnblindedPaymentToken {
    UnblindedPaymentToken::new(
        STANDARD.encode([fill; 96]),
        format!("issuer-key-{}", fill),
        ConfirmationType::Viewed,
        AdType::NotificationAd,
    )
}

pub fn tokens(fills: std::ops::RangeInclusive<u8>) -> Vec<UnblindedPaymentToken> {
    fills.map(token).collect()
}

/// Wall clock that follows tokio's (possibly paused) clock
pub struct TokioClock {
    start: DateTime<Utc>,
    base: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            base: tokio::time::Instant::now(),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.base;
        self.start + chrono::Duration::from_std(elapsed).unwrap()
    }
}

/// In-memory token store whose operations fail a set number of times on demand
#[derive(Default)]
pub struct FaultyTokenStore {
    inner: MemoryTokenStore,
    pub fail_is_empty: AtomicUsize,
    pub fail_all: AtomicUsize,
    pub fail_remove: AtomicUsize,
}

impl FaultyTokenStore {
    pub fn with_tokens(tokens: Vec<UnblindedPaymentToken>) -> Self {
        Self {
            inner: MemoryTokenStore::with_tokens(tokens),
            ..Self::default()
        }
    }

    pub fn fail(counter: &AtomicUsize, times: usize) {
        counter.store(times, Ordering::SeqCst);
    }

    fn check(counter: &AtomicUsize, operation: &str) -> redemption_sdk::Result<()> {
        let armed = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(RedemptionError::TokenStore(format!("{} failed", operation)));
        }
        Ok(())
    }
}

impl TokenStore for FaultyTokenStore {
    fn all(&self) -> redemption_sdk::Result<Vec<UnblindedPaymentToken>> {
        Self::check(&self.fail_all, "all")?;
        self.inner.all()
    }

    fn add(&self, tokens: &[UnblindedPaymentToken]) -> redemption_sdk::Result<()> {
        self.inner.add(tokens)
    }

    fn remove(&self, tokens: &[UnblindedPaymentToken]) -> redemption_sdk::Result<()> {
        Self::check(&self.fail_remove, "remove")?;
        self.inner.remove(tokens)
    }

    fn count(&self) -> redemption_sdk::Result<usize> {
        self.inner.count()
    }

    fn is_empty(&self) -> redemption_sdk::Result<bool> {
        Self::check(&self.fail_is_empty, "is_empty")?;
        self.inner.is_empty()
    }
}

pub fn response(status_code: u16) -> Result<UrlResponse, NetworkError> {
    Ok(UrlResponse::new(status_code, "{}"))
}

/// Replays queued responses, then answers 200. Every request is reported on
/// `sent` before the optional gate is awaited.
pub struct MockNetworkClient {
    responses: Mutex<VecDeque<Result<UrlResponse, NetworkError>>>,
    requests: Mutex<Vec<UrlRequest>>,
    sent: mpsc::UnboundedSender<UrlRequest>,
    gate: Option<Arc<Semaphore>>,
}

impl MockNetworkClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UrlRequest>) {
        let (sent, receiver) = mpsc::unbounded_channel();
        let client = Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            sent,
            gate: None,
        };
        (client, receiver)
    }

    pub fn with_responses(
        self,
        responses: impl IntoIterator<Item = Result<UrlResponse, NetworkError>>,
    ) -> Self {
        self.responses.lock().unwrap().extend(responses);
        self
    }

    /// Requests block until the test adds a permit per request
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<UrlRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkClient for MockNetworkClient {
    async fn send(&self, request: UrlRequest) -> confirmations_net::Result<UrlResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let _ = self.sent.send(request);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| response(200))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DelegateEvent {
    Redeemed(Vec<UnblindedPaymentToken>),
    Failed,
    ScheduledNext(DateTime<Utc>),
    WillRetry(DateTime<Utc>),
    DidRetry,
}

pub struct RecordingDelegate {
    events: mpsc::UnboundedSender<DelegateEvent>,
}

impl RecordingDelegate {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DelegateEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { events }), receiver)
    }

    fn record(&self, event: DelegateEvent) {
        let _ = self.events.send(event);
    }
}

impl RedemptionDelegate for RecordingDelegate {
    fn on_did_redeem_unblinded_payment_tokens(&self, tokens: &[UnblindedPaymentToken]) {
        self.record(DelegateEvent::Redeemed(tokens.to_vec()));
    }

    fn on_failed_to_redeem_unblinded_payment_tokens(&self) {
        self.record(DelegateEvent::Failed);
    }

    fn on_did_schedule_next_unblinded_payment_token_redemption(&self, at: DateTime<Utc>) {
        self.record(DelegateEvent::ScheduledNext(at));
    }

    fn on_will_retry_redeeming_unblinded_payment_tokens(&self, at: DateTime<Utc>) {
        self.record(DelegateEvent::WillRetry(at));
    }

    fn on_did_retry_redeeming_unblinded_payment_tokens(&self) {
        self.record(DelegateEvent::DidRetry);
    }
}

pub struct Harness {
    pub scheduler: RedemptionScheduler,
    pub tokens: Arc<FaultyTokenStore>,
    pub prefs: Arc<MemoryPrefStore>,
    pub network: Arc<MockNetworkClient>,
    pub clock: Arc<TokioClock>,
    pub delegate: Arc<RecordingDelegate>,
    pub events: mpsc::UnboundedReceiver<DelegateEvent>,
    pub requests: mpsc::UnboundedReceiver<UrlRequest>,
}

impl Harness {
    pub fn new(
        tokens: Vec<UnblindedPaymentToken>,
        network: (MockNetworkClient, mpsc::UnboundedReceiver<UrlRequest>),
    ) -> Self {
        let (network, requests) = network;
        let tokens = Arc::new(FaultyTokenStore::with_tokens(tokens));
        let prefs = Arc::new(MemoryPrefStore::new());
        let network = Arc::new(network);
        let clock = Arc::new(TokioClock::new());

        let context = SchedulerContext::new(
            RedemptionConfig::default(),
            tokens.clone(),
            prefs.clone(),
            network.clone(),
        )
        .with_clock(clock.clone())
        .with_user_data_builder(Arc::new(TotalsUserDataBuilder::new("linux")));

        let scheduler = RedemptionScheduler::spawn(context);
        let (delegate, events) = RecordingDelegate::new();
        scheduler.set_delegate(&delegate);

        Self {
            scheduler,
            tokens,
            prefs,
            network,
            clock,
            delegate,
            events,
            requests,
        }
    }

    pub fn with_deadline(self, at: DateTime<Utc>) -> Self {
        self.prefs
            .set_time(NEXT_TOKEN_REDEMPTION_AT_PREF, at)
            .unwrap();
        self
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.prefs.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF).unwrap()
    }

    pub async fn next_event(&mut self) -> DelegateEvent {
        self.events.recv().await.expect("delegate channel closed")
    }
}
