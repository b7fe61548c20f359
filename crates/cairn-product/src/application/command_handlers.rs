//! Command handlers for the Product catalogue context.
//!
//! Each handler validates its command, loads the product through the
//! aggregate store, runs the domain operation and saves the new events.

use cairn_core::aggregate::Aggregate;
use cairn_core::clock::Clock;
use cairn_core::command::Command;
use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_core::event::Event;
use cairn_event_store::AggregateStore;
use tracing::{info, instrument};

use crate::domain::aggregates::Product;
use crate::domain::commands::{ChangePrice, CreateProduct, DeleteProduct, UpdateProduct};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct ProductCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: String,
    /// The aggregate version after the save.
    pub version: u64,
    /// The events produced and persisted.
    pub events: Vec<Event>,
}

/// Loads a product for a follow-up command.
pub(crate) async fn load_product(
    ctx: &Context,
    store: &AggregateStore,
    product_id: &str,
) -> Result<Product, DomainError> {
    store.load_with(ctx, product_id, |id| Product::new(id)).await
}

async fn save_product(
    ctx: &Context,
    store: &AggregateStore,
    mut product: Product,
) -> Result<ProductCommandResult, DomainError> {
    let events = product.uncommitted_events().to_vec();
    store.save(ctx, &mut product).await?;
    info!(
        product_id = product.aggregate_id(),
        version = product.version(),
        events = events.len(),
        "product saved"
    );
    Ok(ProductCommandResult {
        aggregate_id: product.aggregate_id().to_owned(),
        version: product.version(),
        events,
    })
}

/// Handles the `CreateProduct` command: checks the product does not exist yet,
/// creates it, and persists the `ProductCreated` event.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the command is invalid or the product
/// already exists, `DomainError::ConcurrencyConflict` if another writer
/// created it first, or any store error.
#[instrument(skip_all, fields(product_id = command.aggregate_id()))]
pub async fn handle_create_product(
    ctx: &Context,
    command: &CreateProduct,
    clock: &dyn Clock,
    store: &AggregateStore,
) -> Result<ProductCommandResult, DomainError> {
    command.validate()?;

    match store.exists(ctx, command.aggregate_id()).await {
        Ok(()) => {
            return Err(DomainError::Validation(format!(
                "product {} already exists",
                command.aggregate_id()
            )));
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let mut product = Product::new(command.aggregate_id());
    product.create(
        &command.name,
        &command.description,
        command.price,
        &command.sku,
        command.correlation_id,
        clock,
    )?;

    save_product(ctx, store, product).await
}

/// Handles the `UpdateProduct` command: loads the product, renames it, and
/// persists the `ProductUpdated` event.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the product does not exist,
/// `DomainError::Validation` if the command is invalid or the product is
/// deleted, or any store error.
#[instrument(skip_all, fields(product_id = command.aggregate_id()))]
pub async fn handle_update_product(
    ctx: &Context,
    command: &UpdateProduct,
    clock: &dyn Clock,
    store: &AggregateStore,
) -> Result<ProductCommandResult, DomainError> {
    command.validate()?;
    let mut product = load_product(ctx, store, command.aggregate_id()).await?;

    product.update(
        &command.name,
        &command.description,
        command.correlation_id,
        clock,
    )?;

    save_product(ctx, store, product).await
}

/// Handles the `ChangePrice` command: loads the product, reprices it, and
/// persists the `PriceChanged` event.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the product does not exist,
/// `DomainError::Validation` if the product is deleted, or any store error.
#[instrument(skip_all, fields(product_id = command.aggregate_id(), price = command.price))]
pub async fn handle_change_price(
    ctx: &Context,
    command: &ChangePrice,
    clock: &dyn Clock,
    store: &AggregateStore,
) -> Result<ProductCommandResult, DomainError> {
    command.validate()?;
    let mut product = load_product(ctx, store, command.aggregate_id()).await?;

    product.change_price(command.price, command.correlation_id, clock)?;

    save_product(ctx, store, product).await
}

/// Handles the `DeleteProduct` command: loads the product, deletes it, and
/// persists the `ProductDeleted` event.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the product does not exist,
/// `DomainError::Validation` if it is already deleted, or any store error.
#[instrument(skip_all, fields(product_id = command.aggregate_id()))]
pub async fn handle_delete_product(
    ctx: &Context,
    command: &DeleteProduct,
    clock: &dyn Clock,
    store: &AggregateStore,
) -> Result<ProductCommandResult, DomainError> {
    command.validate()?;
    let mut product = load_product(ctx, store, command.aggregate_id()).await?;

    product.delete(command.correlation_id, clock)?;

    save_product(ctx, store, product).await
}
