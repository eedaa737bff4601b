pub mod clock;
pub mod config;
pub mod credential;
pub mod delay;
pub mod delegate;
pub mod error;
pub mod prefs;
pub mod request;
pub mod scheduler;
pub mod state_file;
pub mod store;
mod timer;
pub mod token;
pub mod user_data;
pub mod wallet;

pub use clock::{Clock, SystemClock};
pub use config::RedemptionConfig;
pub use credential::{Credential, CredentialSigner, VerificationKeySigner};
pub use delegate::RedemptionDelegate;
pub use error::{RedemptionError, Result};
pub use prefs::{MemoryPrefStore, PrefStore, NEXT_TOKEN_REDEMPTION_AT_PREF};
pub use request::RedeemPaymentTokensUrlRequestBuilder;
pub use scheduler::{RedemptionScheduler, SchedulerContext, SchedulerStatus};
pub use state_file::{JsonStateStore, PersistedState};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::{AdType, ConfirmationType, UnblindedPaymentToken};
pub use user_data::{TotalsUserDataBuilder, UserDataBuilder};
pub use wallet::WalletInfo;
