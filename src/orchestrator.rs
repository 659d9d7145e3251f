use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::{Action, ActionType};
use crate::brain::{AnyProposer, Proposer};
use crate::config::RunConfig;
use crate::dom::Extractor;
use crate::driver::{PageDriver, ScrollDirection};
use crate::error::{AgentError, Result};
use crate::face::{Clarifier, Narrator};
use crate::policy::{Policy, default_policies};

/// Where a turn currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingSnapshot,
    AwaitingProposal,
    RiskAssessed,
    Confirming,
    Executing,
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnState::AwaitingSnapshot => "awaiting-snapshot",
            TurnState::AwaitingProposal => "awaiting-proposal",
            TurnState::RiskAssessed => "risk-assessed",
            TurnState::Confirming => "confirming",
            TurnState::Executing => "executing",
            TurnState::Done => "done",
        })
    }
}

/// How a turn that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Executed(Action),
    /// The user said no (or nothing). Nothing was executed.
    Declined(Action),
}

impl TurnOutcome {
    pub fn action(&self) -> &Action {
        match self {
            TurnOutcome::Executed(action) | TurnOutcome::Declined(action) => action,
        }
    }

    /// The task loop should stop after this turn.
    pub fn ends_task(&self) -> bool {
        match self {
            TurnOutcome::Executed(action) => action.action_type == ActionType::Done,
            TurnOutcome::Declined(_) => true,
        }
    }
}

fn enter(state: TurnState) {
    tracing::debug!(%state, "turn state");
}

/// Runs single perceive, decide, confirm, act turns.
pub struct Orchestrator {
    driver: Arc<dyn PageDriver>,
    extractor: Extractor,
    proposer: Box<dyn Proposer>,
    clarifier: Option<Arc<dyn Clarifier>>,
    narrator: Option<Arc<dyn Narrator>>,
}

impl Orchestrator {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        proposer: Box<dyn Proposer>,
        policies: Vec<Box<dyn Policy>>,
    ) -> Self {
        Self {
            extractor: Extractor::new(Arc::clone(&driver), policies),
            driver,
            proposer,
            clarifier: None,
            narrator: None,
        }
    }

    /// Resolve the configured provider and wire up the default policy chain.
    pub fn from_config(cfg: &RunConfig, api_key: &str, driver: Arc<dyn PageDriver>) -> Result<Self> {
        let proposer = AnyProposer::from_config(cfg, api_key)?;
        Ok(Self::new(driver, Box::new(proposer), default_policies()).with_screenshot(cfg.screenshot))
    }

    pub fn with_clarifier(mut self, clarifier: Arc<dyn Clarifier>) -> Self {
        self.clarifier = Some(clarifier);
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn with_screenshot(mut self, enabled: bool) -> Self {
        self.extractor = self.extractor.with_screenshot(enabled);
        self
    }

    /// One complete turn for `task`. Keeps nothing between calls.
    pub async fn run(&self, task: &str) -> Result<TurnOutcome> {
        if task.trim().is_empty() {
            return Err(AgentError::validation("Task cannot be empty."));
        }

        enter(TurnState::AwaitingSnapshot);
        let snapshot = self.extractor.extract().await?;

        enter(TurnState::AwaitingProposal);
        let proposal = self.proposer.propose(task, &snapshot).await?;

        let action = Action::from_proposal(proposal, Some(&snapshot));
        enter(TurnState::RiskAssessed);
        tracing::info!(
            action = %action.action_type,
            risk = %action.risk,
            summary = %action.summary,
            "action assessed"
        );

        match &self.clarifier {
            Some(clarifier) if action.risk.requires_confirmation() => {
                enter(TurnState::Confirming);
                if !clarifier.confirm(&action.summary).await? {
                    tracing::warn!(summary = %action.summary, "user declined action");
                    enter(TurnState::Done);
                    return Ok(TurnOutcome::Declined(action));
                }
            }
            _ => {
                if let Some(narrator) = &self.narrator {
                    if let Err(e) = narrator.print(&action.summary).await {
                        tracing::warn!(error = %e, "narration failed");
                    }
                }
            }
        }

        enter(TurnState::Executing);
        execute(self.driver.as_ref(), &action).await?;

        enter(TurnState::Done);
        Ok(TurnOutcome::Executed(action))
    }
}

/// Map an action onto driver primitives.
pub async fn execute(driver: &dyn PageDriver, action: &Action) -> Result<()> {
    match action.action_type {
        ActionType::Open => driver.navigate(action.require_value()?).await,
        ActionType::Click => driver.click(action.require_selector()?).await,
        ActionType::Type => {
            driver
                .fill(action.require_selector()?, action.require_value()?)
                .await
        }
        ActionType::Press => driver.press_key(action.require_value()?).await,
        ActionType::Wait => {
            let raw = action.require_value()?;
            let ms: u64 = raw.trim().parse().map_err(|_| {
                AgentError::invalid_action(ActionType::Wait, format!("'{raw}' is not a duration in ms"))
            })?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        }
        ActionType::Back => driver.back().await,
        ActionType::Forward => driver.forward().await,
        ActionType::Reload => driver.reload().await,
        ActionType::Scroll => {
            let direction: ScrollDirection = action.require_value()?.parse()?;
            driver.scroll(direction).await
        }
        // The next turn captures a fresh snapshot anyway.
        ActionType::Snapshot | ActionType::Done => Ok(()),
    }
}
