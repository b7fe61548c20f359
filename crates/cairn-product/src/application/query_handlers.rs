//! Query handlers for the Product catalogue context.
//!
//! This module contains query handlers that hydrate products through the
//! aggregate store and return read-only view DTOs.

use cairn_core::aggregate::Aggregate;
use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_event_store::AggregateStore;
use serde::Serialize;

use crate::application::command_handlers::load_product;

/// Read-only view of a product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    /// The product identifier.
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    /// Stock keeping unit.
    pub sku: String,
    /// Whether the product has been deleted.
    pub deleted: bool,
    /// Current version (event count).
    pub version: u64,
}

/// Retrieves a product by its aggregate ID.
///
/// Replays the product's stream and returns a serializable view. Deleted
/// products are still returned, flagged as deleted.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` (wrapped) if the product does not
/// exist, `DomainError::Infrastructure` if the store fails or an event does
/// not decode.
pub async fn get_product_by_id(
    ctx: &Context,
    product_id: &str,
    store: &AggregateStore,
) -> Result<ProductView, DomainError> {
    let product = load_product(ctx, store, product_id).await?;
    Ok(ProductView {
        product_id: product.aggregate_id().to_owned(),
        version: product.version(),
        name: product.name,
        description: product.description,
        price: product.price,
        sku: product.sku,
        deleted: product.deleted,
    })
}
