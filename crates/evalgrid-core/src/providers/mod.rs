//! Capability interfaces the engine calls into.
//!
//! A fresh agent and judge are created for every pipeline attempt, scoped to
//! one (condition, sample) pair. Implementations live outside this crate;
//! [`fake`] provides scripted ones.

pub mod fake;

use crate::errors::CapabilityError;
use crate::model::{AgentOutcome, JudgeOutcome, NamedToolServer};
use async_trait::async_trait;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn ask(&self, question: &str) -> Result<AgentOutcome, CapabilityError>;
}

pub trait AgentFactory: Send + Sync {
    fn create(
        &self,
        condition: &str,
        sample_id: &str,
        system_prompt: &str,
        tool_servers: &[NamedToolServer],
    ) -> Box<dyn Agent>;
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn score(
        &self,
        question: &str,
        reference_answer: &str,
        agent_response: &str,
    ) -> Result<JudgeOutcome, CapabilityError>;
}

pub trait JudgeFactory: Send + Sync {
    fn create(&self, condition: &str, sample_id: &str) -> Box<dyn Judge>;
}
