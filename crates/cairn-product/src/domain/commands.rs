//! Commands for the Product catalogue context.

use cairn_core::command::{BaseCommand, Command};
use cairn_core::error::DomainError;
use uuid::Uuid;

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Command to add a product to the catalogue.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    /// Target product.
    pub base: BaseCommand,
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    /// Stock keeping unit.
    pub sku: String,
}

impl Command for CreateProduct {
    fn aggregate_id(&self) -> &str {
        &self.base.aggregate_id
    }

    fn command_type(&self) -> &'static str {
        "CreateProduct"
    }

    fn validate(&self) -> Result<(), DomainError> {
        require("product id", self.aggregate_id())?;
        require("name", &self.name)?;
        require("sku", &self.sku)
    }
}

/// Command to change a product's name and description.
#[derive(Debug, Clone)]
pub struct UpdateProduct {
    /// Target product.
    pub base: BaseCommand,
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// New display name.
    pub name: String,
    /// New description.
    pub description: String,
}

impl Command for UpdateProduct {
    fn aggregate_id(&self) -> &str {
        &self.base.aggregate_id
    }

    fn command_type(&self) -> &'static str {
        "UpdateProduct"
    }

    fn validate(&self) -> Result<(), DomainError> {
        require("product id", self.aggregate_id())?;
        require("name", &self.name)
    }
}

/// Command to reprice a product.
#[derive(Debug, Clone)]
pub struct ChangePrice {
    /// Target product.
    pub base: BaseCommand,
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// New price in minor currency units.
    pub price: u64,
}

impl Command for ChangePrice {
    fn aggregate_id(&self) -> &str {
        &self.base.aggregate_id
    }

    fn command_type(&self) -> &'static str {
        "ChangePrice"
    }
}

/// Command to withdraw a product from the catalogue.
#[derive(Debug, Clone)]
pub struct DeleteProduct {
    /// Target product.
    pub base: BaseCommand,
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for DeleteProduct {
    fn aggregate_id(&self) -> &str {
        &self.base.aggregate_id
    }

    fn command_type(&self) -> &'static str {
        "DeleteProduct"
    }
}
