//! Mock advisor for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{Advisor, AdvisorContext, AdvisorProposal, ProposalAction};

/// Scripted advisor: pops pre-loaded responses in order, then repeats the
/// last one. An empty script fails every call.
pub struct MockAdvisor {
    responses: Arc<Mutex<Vec<DomainResult<AdvisorProposal>>>>,
    calls: Arc<Mutex<u32>>,
}

impl MockAdvisor {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Always propose a hold.
    pub fn holding() -> Self {
        let advisor = Self::new();
        advisor.push_proposal(AdvisorProposal {
            action: ProposalAction::Hold,
            parameter: None,
            current_value: None,
            suggested_value: None,
            reasoning: "mock hold".to_string(),
            confidence: 0.9,
            expected_impact: 0.0,
        });
        advisor
    }

    pub fn push_proposal(&self, proposal: AdvisorProposal) {
        self.responses
            .try_lock()
            .expect("mock setup is single-threaded")
            .push(Ok(proposal));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.responses
            .try_lock()
            .expect("mock setup is single-threaded")
            .push(Err(DomainError::ExternalService {
                service: "mock".to_string(),
                message: message.into(),
            }));
    }

    pub async fn call_count(&self) -> u32 {
        *self.calls.lock().await
    }
}

impl Default for MockAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Advisor for MockAdvisor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn propose(&self, _context: &AdvisorContext<'_>) -> DomainResult<AdvisorProposal> {
        let mut calls = self.calls.lock().await;
        *calls += 1;
        let index = usize::try_from(*calls - 1).unwrap_or(0);
        drop(calls);

        let responses = self.responses.lock().await;
        let response = responses
            .get(index.min(responses.len().saturating_sub(1)))
            .ok_or_else(|| DomainError::ExternalService {
                service: "mock".to_string(),
                message: "no scripted response".to_string(),
            })?;
        match response {
            Ok(proposal) => Ok(proposal.clone()),
            Err(DomainError::ExternalService { service, message }) => {
                Err(DomainError::ExternalService {
                    service: service.clone(),
                    message: message.clone(),
                })
            }
            Err(_) => unreachable!("mock only scripts external-service failures"),
        }
    }
}
