//! Node captions.

use hmmviz_layout::{NodeId, TierCounts};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caption of the initial-state node.
pub const INITIAL_LABEL: &str = "START";

/// Optional custom captions for hidden states and observation symbols.
///
/// Unset tiers fall back to `S{i}` and `O{j}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<String>>,
}

impl Labels {
    pub fn new(states: Option<Vec<String>>, observations: Option<Vec<String>>) -> Self {
        Self {
            states,
            observations,
        }
    }

    pub fn state(&self, index: usize) -> String {
        self.states
            .as_ref()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| format!("S{index}"))
    }

    pub fn observation(&self, index: usize) -> String {
        self.observations
            .as_ref()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| format!("O{index}"))
    }

    pub fn node(&self, node: NodeId) -> String {
        match node {
            NodeId::Initial => INITIAL_LABEL.to_string(),
            NodeId::State(i) => self.state(i),
            NodeId::Observation(j) => self.observation(j),
        }
    }

    /// Reject custom captions whose count does not match the model.
    pub fn check(&self, counts: TierCounts) -> Result<()> {
        if let Some(states) = &self.states {
            if states.len() != counts.states {
                return Err(Error::validation(format!(
                    "{} state labels for {} states",
                    states.len(),
                    counts.states
                )));
            }
        }
        if let Some(observations) = &self.observations {
            if observations.len() != counts.observations {
                return Err(Error::validation(format!(
                    "{} observation labels for {} observations",
                    observations.len(),
                    counts.observations
                )));
            }
        }
        Ok(())
    }
}
