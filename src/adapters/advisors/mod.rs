//! Advisor provider implementations and chain assembly.

pub mod anthropic;
pub mod heuristic;
pub mod mock;

pub use anthropic::AnthropicAdvisor;
pub use heuristic::HeuristicAdvisor;
pub use mock::MockAdvisor;

use std::sync::Arc;

use tracing::warn;

use crate::domain::models::Config;
use crate::domain::ports::Advisor;
use crate::services::AdvisorChain;

/// Build the advisor chain from configuration, in the configured provider
/// order. Unknown names are skipped with a warning; a provider that fails
/// to construct (for example a missing HTTP client) is skipped the same
/// way, so a partial configuration still yields a working chain.
pub fn build_chain(config: &Config) -> AdvisorChain {
    let mut providers: Vec<Arc<dyn Advisor>> = Vec::new();
    for name in &config.advisors.providers {
        match name.as_str() {
            "anthropic" => match AnthropicAdvisor::new(config.advisors.anthropic.clone()) {
                Ok(advisor) => providers.push(Arc::new(advisor)),
                Err(err) => warn!(error = %err, "skipping anthropic advisor"),
            },
            "heuristic" => providers.push(Arc::new(HeuristicAdvisor::new(
                config.evaluation.clone(),
                config.safety.clone(),
            ))),
            "mock" => providers.push(Arc::new(MockAdvisor::holding())),
            other => warn!(provider = other, "unknown advisor provider in config"),
        }
    }
    AdvisorChain::new(providers)
}
