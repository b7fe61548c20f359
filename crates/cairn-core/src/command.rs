//! Command abstractions.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Trait that all commands implement. Commands are never persisted.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The aggregate the command targets.
    fn aggregate_id(&self) -> &str;

    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Checks the command before any store interaction.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the aggregate id is blank.
    fn validate(&self) -> Result<(), DomainError> {
        if self.aggregate_id().trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "{}: aggregate id is required",
                self.command_type()
            )));
        }
        Ok(())
    }
}

/// Carrier for the aggregate id that concrete commands embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCommand {
    /// The aggregate the command targets.
    pub aggregate_id: String,
}

impl BaseCommand {
    /// Creates a new base command.
    #[must_use]
    pub fn new(aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
        }
    }
}

impl Command for BaseCommand {
    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    fn command_type(&self) -> &'static str {
        "base"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_non_blank_aggregate_id() {
        assert!(BaseCommand::new("sku-42").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_aggregate_id() {
        let result = BaseCommand::new("   ").validate();

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("aggregate id is required")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
