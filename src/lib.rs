//! A browser agent that works one turn at a time: snapshot the page, let a
//! language model propose one action, classify its risk, ask the user when
//! the action could change something, then execute it.

pub mod actions;
pub mod brain;
pub mod config;
pub mod credentials;
pub mod dom;
pub mod driver;
pub mod error;
pub mod face;
pub mod hands;
pub mod orchestrator;
pub mod policy;
pub mod risk;
pub mod types;

pub use actions::{Action, ActionProposal, ActionRisk, ActionType};
pub use error::{AgentError, Result};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use types::PageSnapshot;
