//! The `sku-42` walkthrough: create a product, reprice it, read it back, then
//! show that both a duplicate create and a stale writer are turned away.

use cairn_core::aggregate::Aggregate;
use cairn_core::clock::Clock;
use cairn_core::command::BaseCommand;
use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_event_store::AggregateStore;
use cairn_product::application::command_handlers::{handle_change_price, handle_create_product};
use cairn_product::application::query_handlers::{ProductView, get_product_by_id};
use cairn_product::domain::aggregates::Product;
use cairn_product::domain::commands::{ChangePrice, CreateProduct};
use tracing::{info, warn};
use uuid::Uuid;

const PRODUCT_ID: &str = "sku-42";

/// Outcome of the walkthrough.
#[derive(Debug)]
pub struct Report {
    /// The product as read back at the end.
    pub view: ProductView,
    /// A second `CreateProduct` for the same id was refused.
    pub duplicate_rejected: bool,
    /// A writer that never loaded the stream lost on save.
    pub stale_save_conflicted: bool,
}

fn create_command(correlation_id: Uuid) -> CreateProduct {
    CreateProduct {
        base: BaseCommand::new(PRODUCT_ID),
        correlation_id,
        name: "Desk lamp".to_owned(),
        description: "Brass, 40W".to_owned(),
        price: 4_999,
        sku: "SKU-42".to_owned(),
    }
}

/// Runs the walkthrough against `store`.
///
/// # Errors
///
/// Returns the first unexpected `DomainError`. A product left behind by an
/// earlier run against the same durable store counts as unexpected.
pub async fn run(
    ctx: &Context,
    store: &AggregateStore,
    clock: &dyn Clock,
) -> Result<Report, DomainError> {
    let correlation_id = Uuid::new_v4();

    let created = handle_create_product(ctx, &create_command(correlation_id), clock, store).await?;
    info!(version = created.version, "product created");

    let repriced = handle_change_price(
        ctx,
        &ChangePrice {
            base: BaseCommand::new(PRODUCT_ID),
            correlation_id,
            price: 5_499,
        },
        clock,
        store,
    )
    .await?;
    info!(version = repriced.version, "product repriced");

    let duplicate_rejected =
        match handle_create_product(ctx, &create_command(correlation_id), clock, store).await {
            Err(DomainError::Validation(msg)) => {
                info!(%msg, "duplicate create rejected");
                true
            }
            Err(e) => return Err(e),
            Ok(_) => false,
        };

    // Skips the existence check, as a writer racing the first create would.
    let mut stale = Product::new(PRODUCT_ID);
    stale.create("Desk lamp", "", 1, "SKU-42", correlation_id, clock)?;
    let stale_save_conflicted = match store.save(ctx, &mut stale).await {
        Err(e) if e.is_concurrency_conflict() => {
            warn!(error = %e, uncommitted = stale.uncommitted_events().len(), "stale save lost");
            true
        }
        Err(e) => return Err(e),
        Ok(()) => false,
    };

    let view = get_product_by_id(ctx, PRODUCT_ID, store).await?;

    Ok(Report {
        view,
        duplicate_rejected,
        stale_save_conflicted,
    })
}
