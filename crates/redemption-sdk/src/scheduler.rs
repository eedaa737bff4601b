/// Redeems unblinded payment tokens on a randomized schedule.
///
/// All state lives on one task that handles commands in order: external calls,
/// timer expiries and network completions. At most one of {redeem timer, retry
/// timer, request in flight} is active at a time, so redemptions never overlap.
///
/// Cycle:
/// 1. `maybe_redeem_after_delay` arms the redeem timer for the persisted deadline
/// 2. On expiry every token in the store is submitted in one request
/// 3. 200 removes exactly the submitted tokens and schedules the next deadline
/// 4. Anything else arms the retry timer, which submits again on expiry
use std::collections::HashSet;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use confirmations_net::{NetworkClient, HTTP_OK};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RedemptionConfig;
use crate::credential::{CredentialSigner, VerificationKeySigner};
use crate::delay::{add_duration, calculate_next_token_redemption_at, calculate_token_redemption_delay};
use crate::delegate::RedemptionDelegate;
use crate::error::{RedemptionError, Result};
use crate::prefs::{PrefStore, NEXT_TOKEN_REDEMPTION_AT_PREF};
use crate::request::{build_payment_payload, RedeemPaymentTokensUrlRequestBuilder};
use crate::store::TokenStore;
use crate::timer::OneShotTimer;
use crate::token::UnblindedPaymentToken;
use crate::user_data::{TotalsUserDataBuilder, UserDataBuilder};
use crate::wallet::WalletInfo;

/// Collaborators the scheduler drives
#[derive(Clone)]
pub struct SchedulerContext {
    pub config: RedemptionConfig,
    pub token_store: Arc<dyn TokenStore>,
    pub prefs: Arc<dyn PrefStore>,
    pub network: Arc<dyn NetworkClient>,
    pub clock: Arc<dyn Clock>,
    pub user_data_builder: Arc<dyn UserDataBuilder>,
    pub credential_signer: Arc<dyn CredentialSigner>,
}

impl SchedulerContext {
    pub fn new(
        config: RedemptionConfig,
        token_store: Arc<dyn TokenStore>,
        prefs: Arc<dyn PrefStore>,
        network: Arc<dyn NetworkClient>,
    ) -> Self {
        Self {
            config,
            token_store,
            prefs,
            network,
            clock: Arc::new(SystemClock),
            user_data_builder: Arc::new(TotalsUserDataBuilder::default()),
            credential_signer: Arc::new(VerificationKeySigner),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_user_data_builder(mut self, builder: Arc<dyn UserDataBuilder>) -> Self {
        self.user_data_builder = builder;
        self
    }

    pub fn with_credential_signer(mut self, signer: Arc<dyn CredentialSigner>) -> Self {
        self.credential_signer = signer;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub is_processing: bool,
    pub is_redeem_timer_running: bool,
    pub is_retry_timer_running: bool,
    pub redeem_at: Option<DateTime<Utc>>,
    pub retry_at: Option<DateTime<Utc>>,
    /// Redeemed tokens the token store has not yet let go of
    pub pending_removal: usize,
}

impl SchedulerStatus {
    pub fn is_idle(&self) -> bool {
        !self.is_processing && !self.is_redeem_timer_running && !self.is_retry_timer_running
    }
}

enum Command {
    MaybeRedeemAfterDelay(WalletInfo),
    SetDelegate(Option<Weak<dyn RedemptionDelegate>>),
    RedeemTimerFired(u64),
    RetryTimerFired(u64),
    RedeemCompleted(RedeemOutcome),
    Status(oneshot::Sender<SchedulerStatus>),
}

struct RedeemOutcome {
    submitted: Vec<UnblindedPaymentToken>,
    /// Tokens no credential could be built for
    rejected: Vec<UnblindedPaymentToken>,
    result: Result<()>,
}

/// Handle to the scheduler task. Dropping it stops the task and both timers;
/// a request still in flight completes into the void.
pub struct RedemptionScheduler {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl RedemptionScheduler {
    /// Must be called from within a tokio runtime
    pub fn spawn(context: SchedulerContext) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let state = SchedulerState::new(context, commands.clone());
        let task = tokio::spawn(state.run(receiver));

        Self { commands, task }
    }

    /// Arms the redeem timer unless a redemption is already scheduled,
    /// retrying or in flight
    pub fn maybe_redeem_after_delay(&self, wallet: WalletInfo) {
        self.send(Command::MaybeRedeemAfterDelay(wallet));
    }

    /// Holds the delegate weakly; notifications stop once it is dropped
    pub fn set_delegate<D: RedemptionDelegate + 'static>(&self, delegate: &Arc<D>) {
        let delegate: Arc<dyn RedemptionDelegate> = delegate.clone();
        self.send(Command::SetDelegate(Some(Arc::downgrade(&delegate))));
    }

    pub fn clear_delegate(&self) {
        self.send(Command::SetDelegate(None));
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Status(reply))
            .map_err(|_| RedemptionError::SchedulerStopped)?;
        response.await.map_err(|_| RedemptionError::SchedulerStopped)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Redemption scheduler is no longer running");
        }
    }
}

impl Drop for RedemptionScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SchedulerState {
    context: SchedulerContext,
    commands: mpsc::UnboundedSender<Command>,
    delegate: Option<Weak<dyn RedemptionDelegate>>,
    wallet: Option<WalletInfo>,
    is_processing: bool,
    // Server already accepted these; they must never be submitted again
    pending_removal: HashSet<UnblindedPaymentToken>,
    redeem_timer: OneShotTimer,
    retry_timer: OneShotTimer,
}

impl SchedulerState {
    fn new(context: SchedulerContext, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            context,
            commands,
            delegate: None,
            wallet: None,
            is_processing: false,
            pending_removal: HashSet::new(),
            redeem_timer: OneShotTimer::new(),
            retry_timer: OneShotTimer::new(),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::MaybeRedeemAfterDelay(wallet) => self.maybe_redeem_after_delay(wallet),
            Command::SetDelegate(delegate) => self.delegate = delegate,
            Command::RedeemTimerFired(generation) => {
                if self.redeem_timer.take_expiry(generation) {
                    self.redeem();
                }
            }
            Command::RetryTimerFired(generation) => {
                if self.retry_timer.take_expiry(generation) {
                    self.on_retry();
                }
            }
            Command::RedeemCompleted(outcome) => self.on_redeem(outcome),
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_processing: self.is_processing,
            is_redeem_timer_running: self.redeem_timer.is_running(),
            is_retry_timer_running: self.retry_timer.is_running(),
            redeem_at: self.redeem_timer.fires_at(),
            retry_at: self.retry_timer.fires_at(),
            pending_removal: self.pending_removal.len(),
        }
    }

    fn maybe_redeem_after_delay(&mut self, wallet: WalletInfo) {
        if self.is_processing || self.redeem_timer.is_running() || self.retry_timer.is_running() {
            debug!("Already scheduled or redeeming unblinded payment tokens");
            return;
        }

        if !wallet.is_valid() {
            error!("Failed to redeem unblinded payment tokens due to an invalid wallet");
            self.notify(|delegate| delegate.on_failed_to_redeem_unblinded_payment_tokens());
            return;
        }

        self.wallet = Some(wallet);

        let now = self.context.clock.now();
        let delay = calculate_token_redemption_delay(
            now,
            self.next_token_redemption_at(now),
            self.context.config.expired_redemption_delay,
        );
        let redeem_at = add_duration(now, delay);

        let commands = self.commands.clone();
        self.redeem_timer.start(delay, redeem_at, move |generation| {
            let _ = commands.send(Command::RedeemTimerFired(generation));
        });

        info!(
            "Redeem unblinded payment tokens at {} (in {}s)",
            redeem_at,
            delay.as_secs()
        );
    }

    /// Persisted deadline, or a freshly drawn one if none was stored yet
    fn next_token_redemption_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.context.prefs.get_time(NEXT_TOKEN_REDEMPTION_AT_PREF) {
            Ok(Some(at)) => return at,
            Ok(None) => {}
            Err(e) => warn!("Failed to read next token redemption: {}", e),
        }

        let at = calculate_next_token_redemption_at(now, self.context.config.next_redemption_interval());
        self.persist_next_token_redemption_at(at);
        at
    }

    fn persist_next_token_redemption_at(&self, at: DateTime<Utc>) {
        if let Err(e) = self
            .context
            .prefs
            .set_time(NEXT_TOKEN_REDEMPTION_AT_PREF, at)
        {
            warn!("Failed to save next token redemption: {}", e);
        }
    }

    fn redeem(&mut self) {
        // Only reachable from timer expiries, which cannot fire while processing
        if self.is_processing {
            warn!("Already redeeming unblinded payment tokens");
            return;
        }

        let Some(wallet) = self.wallet.clone() else {
            warn!("Unable to redeem unblinded payment tokens without a wallet");
            return;
        };

        info!("Redeem unblinded payment tokens");

        self.remove_pending_tokens();

        match self.context.token_store.is_empty() {
            Ok(true) => {
                info!("No unblinded payment tokens to redeem");
                self.schedule_next_redemption();
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Failed to read unblinded payment tokens: {}", e);
                self.is_processing = true;
                self.failed_to_redeem(e.should_retry());
                return;
            }
        }

        self.is_processing = true;

        // The list fetched here is the list removed on success
        let tokens: Vec<_> = match self.context.token_store.all() {
            Ok(tokens) => tokens
                .into_iter()
                .filter(|token| !self.pending_removal.contains(token))
                .collect(),
            Err(e) => {
                error!("Failed to read unblinded payment tokens: {}", e);
                self.failed_to_redeem(e.should_retry());
                return;
            }
        };

        if tokens.is_empty() {
            info!("All unblinded payment tokens were already redeemed");
            self.is_processing = false;
            self.schedule_next_redemption();
            return;
        }

        debug!("Redeeming {} unblinded payment token(s)", tokens.len());

        let context = self.context.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let outcome = redeem_unblinded_payment_tokens(&context, &wallet, tokens).await;
            let _ = commands.send(Command::RedeemCompleted(outcome));
        });
    }

    fn on_redeem(&mut self, outcome: RedeemOutcome) {
        let RedeemOutcome {
            submitted,
            rejected,
            result,
        } = outcome;

        if !rejected.is_empty() {
            warn!("Discarding {} unredeemable unblinded payment token(s)", rejected.len());
            if let Err(e) = self.context.token_store.remove(&rejected) {
                error!("Failed to remove unredeemable unblinded payment tokens: {}", e);
            }
        }

        match result {
            Ok(()) => self.successfully_redeemed(submitted),
            Err(RedemptionError::NoRedeemableTokens) => {
                error!("Failed to redeem unblinded payment tokens: none could be signed");
                self.failed_to_redeem(false);
                self.schedule_next_redemption();
            }
            Err(e) => {
                error!("Failed to redeem unblinded payment tokens: {}", e);
                self.failed_to_redeem(e.should_retry());
            }
        }
    }

    fn successfully_redeemed(&mut self, tokens: Vec<UnblindedPaymentToken>) {
        info!("Successfully redeemed {} unblinded payment token(s)", tokens.len());

        self.is_processing = false;
        self.retry_timer.stop();

        self.pending_removal.extend(tokens.iter().cloned());
        self.remove_pending_tokens();

        self.notify(|delegate| delegate.on_did_redeem_unblinded_payment_tokens(&tokens));

        self.schedule_next_redemption();
    }

    fn remove_pending_tokens(&mut self) {
        if self.pending_removal.is_empty() {
            return;
        }

        let tokens: Vec<_> = self.pending_removal.iter().cloned().collect();
        match self.context.token_store.remove(&tokens) {
            Ok(()) => self.pending_removal.clear(),
            Err(e) => error!(
                "Failed to remove {} redeemed unblinded payment token(s): {}",
                tokens.len(),
                e
            ),
        }
    }

    fn failed_to_redeem(&mut self, should_retry: bool) {
        self.notify(|delegate| delegate.on_failed_to_redeem_unblinded_payment_tokens());

        if should_retry {
            self.retry();
        } else {
            self.is_processing = false;
        }
    }

    fn schedule_next_redemption(&mut self) {
        let now = self.context.clock.now();
        let at = calculate_next_token_redemption_at(now, self.context.config.next_redemption_interval());
        self.persist_next_token_redemption_at(at);

        info!("Scheduled next unblinded payment token redemption at {}", at);
        self.notify(|delegate| {
            delegate.on_did_schedule_next_unblinded_payment_token_redemption(at)
        });

        if let Some(wallet) = self.wallet.clone() {
            self.maybe_redeem_after_delay(wallet);
        }
    }

    fn retry(&mut self) {
        let retry_after = self.context.config.retry_after;
        let retry_at = add_duration(self.context.clock.now(), retry_after);

        let commands = self.commands.clone();
        self.retry_timer.start(retry_after, retry_at, move |generation| {
            let _ = commands.send(Command::RetryTimerFired(generation));
        });

        info!("Retry redeeming unblinded payment tokens at {}", retry_at);
        self.notify(|delegate| delegate.on_will_retry_redeeming_unblinded_payment_tokens(retry_at));
    }

    fn on_retry(&mut self) {
        info!("Retrying redeeming unblinded payment tokens");
        self.notify(|delegate| delegate.on_did_retry_redeeming_unblinded_payment_tokens());

        self.is_processing = false;
        self.redeem();
    }

    fn notify<F>(&self, notification: F)
    where
        F: FnOnce(&dyn RedemptionDelegate),
    {
        if let Some(delegate) = self.delegate.as_ref().and_then(Weak::upgrade) {
            notification(delegate.as_ref());
        }
    }
}

async fn redeem_unblinded_payment_tokens(
    context: &SchedulerContext,
    wallet: &WalletInfo,
    tokens: Vec<UnblindedPaymentToken>,
) -> RedeemOutcome {
    let payload = match build_payment_payload(&wallet.payment_id) {
        Ok(payload) => payload,
        Err(e) => {
            return RedeemOutcome {
                submitted: tokens,
                rejected: Vec::new(),
                result: Err(e),
            }
        }
    };

    // A token that cannot be signed now never will be
    let (submitted, rejected): (Vec<_>, Vec<_>) = tokens.into_iter().partition(|token| {
        match context.credential_signer.sign(token, &payload) {
            Ok(_) => true,
            Err(e) => {
                warn!("Skipping unblinded payment token {}: {}", token.transaction_id, e);
                false
            }
        }
    });

    let result = if submitted.is_empty() {
        Err(RedemptionError::NoRedeemableTokens)
    } else {
        send_redeem_request(context, wallet, &submitted).await
    };

    RedeemOutcome {
        submitted,
        rejected,
        result,
    }
}

async fn send_redeem_request(
    context: &SchedulerContext,
    wallet: &WalletInfo,
    tokens: &[UnblindedPaymentToken],
) -> Result<()> {
    let user_data = context.user_data_builder.build(tokens).await;
    let request = RedeemPaymentTokensUrlRequestBuilder::new(wallet, tokens, user_data)
        .build(context.credential_signer.as_ref())?;

    let response = context.network.send(request).await?;
    if response.status_code != HTTP_OK {
        return Err(RedemptionError::UnexpectedStatus(response.status_code));
    }

    Ok(())
}
