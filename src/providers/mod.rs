//! Push providers and health-aware provider management.
//!
//! Each provider speaks to one downstream push channel. The manager owns
//! provider selection, per-provider circuit breakers, and fallback.

mod apns;
mod circuit;
mod client;
mod fcm;
mod health;
mod manager;
mod provider;
mod web_push;

pub use apns::ApnsProvider;
pub use circuit::{CircuitBreaker, CircuitState};
pub use client::HTTP_CLIENT;
pub use fcm::FcmProvider;
pub use health::{ProviderHealth, ProviderHealthReport};
pub use manager::{ManagedDelivery, MulticastOutcome, ProviderManager};
pub use provider::{PushMessage, PushProvider, ProviderResponse, RecipientDelivery};
pub use web_push::WebPushProvider;
