use crate::error::{CoreError, Result};
use crate::types::Address;
use serde::{Deserialize, Serialize};

/// Tunables of the lottery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Largest ticket range a single purchase may allocate.
    pub max_tickets_per_purchase: u32,
    /// Rejection-sampling rounds allowed per winner before the draw falls
    /// back to probing for the next undrawn ticket.
    pub draw_rounds_per_winner: u32,
    /// Label the custody account address is derived from.
    pub custody_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tickets_per_purchase: 30,
            draw_rounds_per_winner: 64,
            custody_label: "sealdraw:custody".to_string(),
        }
    }
}

impl EngineSettings {
    /// Account that holds collected ticket payments.
    pub fn custody_address(&self) -> Address {
        Address::from_label(&self.custody_label)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tickets_per_purchase == 0 {
            return Err(CoreError::config(
                "Max tickets per purchase must be greater than 0",
            ));
        }

        if self.draw_rounds_per_winner == 0 {
            return Err(CoreError::config(
                "Draw rounds per winner must be greater than 0",
            ));
        }

        if self.custody_label.is_empty() {
            return Err(CoreError::config("Custody label cannot be empty"));
        }

        Ok(())
    }
}
