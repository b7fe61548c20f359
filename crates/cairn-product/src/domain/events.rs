//! Domain events for the Product catalogue context.

use cairn_core::error::DomainError;
use cairn_core::event::Event;
use serde::{Deserialize, Serialize};

/// Event type for [`ProductCreated`].
pub const PRODUCT_CREATED_EVENT_TYPE: &str = "ProductCreated";
/// Event type for [`ProductUpdated`].
pub const PRODUCT_UPDATED_EVENT_TYPE: &str = "ProductUpdated";
/// Event type for [`PriceChanged`].
pub const PRICE_CHANGED_EVENT_TYPE: &str = "PriceChanged";
/// Event type for [`ProductDeleted`].
pub const PRODUCT_DELETED_EVENT_TYPE: &str = "ProductDeleted";

/// Emitted when a product is added to the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    /// Stock keeping unit.
    pub sku: String,
}

/// Emitted when a product's name or description changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    /// New display name.
    pub name: String,
    /// New description.
    pub description: String,
}

/// Emitted when a product is repriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    /// New price in minor currency units.
    pub price: u64,
}

/// Emitted when a product is withdrawn from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductDeleted {}

/// Event payload variants for the Product catalogue context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductEventKind {
    /// The product has been created.
    ProductCreated(ProductCreated),
    /// The product's details have changed.
    ProductUpdated(ProductUpdated),
    /// The product's price has changed.
    PriceChanged(PriceChanged),
    /// The product has been deleted.
    ProductDeleted(ProductDeleted),
}

impl ProductEventKind {
    /// Returns the event type recorded in the stream for this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProductCreated(_) => PRODUCT_CREATED_EVENT_TYPE,
            Self::ProductUpdated(_) => PRODUCT_UPDATED_EVENT_TYPE,
            Self::PriceChanged(_) => PRICE_CHANGED_EVENT_TYPE,
            Self::ProductDeleted(_) => PRODUCT_DELETED_EVENT_TYPE,
        }
    }

    /// Serializes the payload into `event`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the payload cannot be serialized.
    pub fn encode_into(&self, event: Event) -> Result<Event, DomainError> {
        match self {
            Self::ProductCreated(payload) => event.with_json_data(payload),
            Self::ProductUpdated(payload) => event.with_json_data(payload),
            Self::PriceChanged(payload) => event.with_json_data(payload),
            Self::ProductDeleted(payload) => event.with_json_data(payload),
        }
    }

    /// Decodes a stored event by its type tag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not decode
    /// and `DomainError::Validation` for an event type this context does not
    /// know.
    pub fn decode(event: &Event) -> Result<Self, DomainError> {
        match event.event_type.as_str() {
            PRODUCT_CREATED_EVENT_TYPE => event.json_data().map(Self::ProductCreated),
            PRODUCT_UPDATED_EVENT_TYPE => event.json_data().map(Self::ProductUpdated),
            PRICE_CHANGED_EVENT_TYPE => event.json_data().map(Self::PriceChanged),
            PRODUCT_DELETED_EVENT_TYPE => event.json_data().map(Self::ProductDeleted),
            other => Err(DomainError::Validation(format!(
                "unknown product event type {other}"
            ))),
        }
    }
}
