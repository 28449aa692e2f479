//! Ordered fallback chain over advisor providers.
//!
//! Any single provider may be rate-limited, unreachable, or emit garbage;
//! the chain tries each in configured order and treats a schema violation
//! exactly like a transport failure. Only a fully exhausted chain is an
//! error, and even that does not abort the cycle.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ParameterSet;
use crate::domain::ports::{Advisor, AdvisorContext, AdvisorProposal};

/// Tries advisors in order; first structurally valid proposal wins.
pub struct AdvisorChain {
    providers: Vec<Arc<dyn Advisor>>,
}

impl AdvisorChain {
    pub fn new(providers: Vec<Arc<dyn Advisor>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Ask each provider in turn until one returns a proposal that passes
    /// the schema gate. Returns the winning provider's name with the
    /// proposal.
    pub async fn propose(
        &self,
        context: &AdvisorContext<'_>,
        parameters: &ParameterSet,
    ) -> DomainResult<(String, AdvisorProposal)> {
        for provider in &self.providers {
            match provider.propose(context).await {
                Ok(proposal) => match proposal.validate(parameters) {
                    Ok(()) => {
                        info!(provider = provider.name(), "advisor proposal accepted");
                        return Ok((provider.name().to_string(), proposal));
                    }
                    Err(violation) => {
                        warn!(
                            provider = provider.name(),
                            error = %violation,
                            "advisor output failed schema check; falling through"
                        );
                    }
                },
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        error = %err,
                        "advisor provider failed; falling through"
                    );
                }
            }
        }
        Err(DomainError::AdvisorsExhausted {
            attempts: self.providers.len(),
        })
    }
}
