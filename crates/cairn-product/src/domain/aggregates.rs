//! Aggregate roots for the Product catalogue context.

use cairn_core::aggregate::{Aggregate, AggregateBase, AggregateType};
use cairn_core::clock::Clock;
use cairn_core::error::DomainError;
use cairn_core::event::{Event, EventMetadata};
use uuid::Uuid;

use super::events::{
    PriceChanged, ProductCreated, ProductDeleted, ProductEventKind, ProductUpdated,
};

/// Aggregate type tag for products.
pub const PRODUCT_AGGREGATE_TYPE: &str = "product";

/// The aggregate root for a catalogue product.
#[derive(Debug)]
pub struct Product {
    base: AggregateBase,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    /// Stock keeping unit.
    pub sku: String,
    /// Whether the product has been created.
    pub created: bool,
    /// Whether the product has been deleted.
    pub deleted: bool,
}

impl Product {
    /// Creates an empty product at version 0.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            base: AggregateBase::new(id, AggregateType::new(PRODUCT_AGGREGATE_TYPE)),
            name: String::new(),
            description: String::new(),
            price: 0,
            sku: String::new(),
            created: false,
            deleted: false,
        }
    }

    fn record(
        &mut self,
        kind: &ProductEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = Event::for_aggregate(&*self, kind.event_type(), clock)
            .with_json_metadata(&EventMetadata::correlated(correlation_id))?;
        let event = kind.encode_into(event)?;
        self.apply(event)
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::Validation(format!(
                "product {} has not been created",
                self.aggregate_id()
            )));
        }
        if self.deleted {
            return Err(DomainError::Validation(format!(
                "product {} has been deleted",
                self.aggregate_id()
            )));
        }
        Ok(())
    }

    /// Creates the product, producing a `ProductCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the product already exists or the
    /// name or sku is blank.
    pub fn create(
        &mut self,
        name: &str,
        description: &str,
        price: u64,
        sku: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.created {
            return Err(DomainError::Validation(format!(
                "product {} already exists",
                self.aggregate_id()
            )));
        }
        if name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".into()));
        }
        if sku.trim().is_empty() {
            return Err(DomainError::Validation("sku is required".into()));
        }

        let kind = ProductEventKind::ProductCreated(ProductCreated {
            name: name.to_owned(),
            description: description.to_owned(),
            price,
            sku: sku.to_owned(),
        });
        self.record(&kind, correlation_id, clock)
    }

    /// Renames or redescribes the product, producing a `ProductUpdated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the product is not live or the
    /// name is blank.
    pub fn update(
        &mut self,
        name: &str,
        description: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_live()?;
        if name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".into()));
        }

        let kind = ProductEventKind::ProductUpdated(ProductUpdated {
            name: name.to_owned(),
            description: description.to_owned(),
        });
        self.record(&kind, correlation_id, clock)
    }

    /// Reprices the product, producing a `PriceChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the product is not live.
    pub fn change_price(
        &mut self,
        price: u64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_live()?;
        let kind = ProductEventKind::PriceChanged(PriceChanged { price });
        self.record(&kind, correlation_id, clock)
    }

    /// Deletes the product, producing a `ProductDeleted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the product is not live.
    pub fn delete(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_live()?;
        let kind = ProductEventKind::ProductDeleted(ProductDeleted {});
        self.record(&kind, correlation_id, clock)
    }
}

impl Aggregate for Product {
    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, event: &Event) -> Result<(), DomainError> {
        match ProductEventKind::decode(event)? {
            ProductEventKind::ProductCreated(created) => {
                self.name = created.name;
                self.description = created.description;
                self.price = created.price;
                self.sku = created.sku;
                self.created = true;
            }
            ProductEventKind::ProductUpdated(updated) => {
                self.name = updated.name;
                self.description = updated.description;
            }
            ProductEventKind::PriceChanged(changed) => {
                self.price = changed.price;
            }
            ProductEventKind::ProductDeleted(_) => {
                self.deleted = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cairn_test_support::FixedClock;

    use super::*;
    use crate::domain::events::{
        PRICE_CHANGED_EVENT_TYPE, PRODUCT_CREATED_EVENT_TYPE, PRODUCT_DELETED_EVENT_TYPE,
    };

    fn created(id: &str) -> Product {
        let mut product = Product::new(id);
        product
            .create(
                "Desk lamp",
                "Brass, 40W",
                4_999,
                "SKU-42",
                Uuid::new_v4(),
                &FixedClock::standard(),
            )
            .unwrap();
        product
    }

    #[test]
    fn test_create_records_event_and_applies_state() {
        // Arrange
        let correlation_id = Uuid::new_v4();
        let mut product = Product::new("sku-42");

        // Act
        product
            .create(
                "Desk lamp",
                "Brass, 40W",
                4_999,
                "SKU-42",
                correlation_id,
                &FixedClock::standard(),
            )
            .unwrap();

        // Assert
        assert_eq!(product.version(), 1);
        assert_eq!(product.name, "Desk lamp");
        assert_eq!(product.price, 4_999);
        let events = product.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, PRODUCT_CREATED_EVENT_TYPE);
        assert_eq!(events[0].aggregate_type.as_str(), PRODUCT_AGGREGATE_TYPE);
        assert_eq!(events[0].timestamp, FixedClock::standard().0);
        let metadata: EventMetadata = events[0].json_metadata().unwrap();
        assert_eq!(metadata.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let mut product = created("sku-42");

        let result = product.create(
            "Again",
            "",
            1,
            "SKU-42",
            Uuid::new_v4(),
            &FixedClock::standard(),
        );

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("already exists")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(product.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_change_price_before_create_is_rejected() {
        let mut product = Product::new("sku-42");

        let result = product.change_price(100, Uuid::new_v4(), &FixedClock::standard());

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("has not been created")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(product.version(), 0);
    }

    #[test]
    fn test_change_price_and_delete_advance_version() {
        // Arrange
        let mut product = created("sku-42");
        let clock = FixedClock::standard();

        // Act
        product.change_price(5_499, Uuid::new_v4(), &clock).unwrap();
        product.delete(Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(product.version(), 3);
        assert_eq!(product.price, 5_499);
        assert!(product.deleted);
        let types: Vec<&str> = product
            .uncommitted_events()
            .iter()
            .map(|e| e.event_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                PRODUCT_CREATED_EVENT_TYPE,
                PRICE_CHANGED_EVENT_TYPE,
                PRODUCT_DELETED_EVENT_TYPE
            ]
        );
    }

    #[test]
    fn test_mutation_after_delete_is_rejected() {
        let clock = FixedClock::standard();
        let mut product = created("sku-42");
        product.delete(Uuid::new_v4(), &clock).unwrap();

        let result = product.update("Renamed", "", Uuid::new_v4(), &clock);

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("has been deleted")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_rebuilds_state_without_uncommitted_events() {
        // Arrange
        let clock = FixedClock::standard();
        let mut source = created("sku-42");
        source
            .update("Floor lamp", "Steel", Uuid::new_v4(), &clock)
            .unwrap();
        let history = source.uncommitted_events().to_vec();
        let mut replayed = Product::new("sku-42");

        // Act
        for event in &history {
            replayed.raise_event(event).unwrap();
        }

        // Assert
        assert_eq!(replayed.version(), 2);
        assert_eq!(replayed.name, "Floor lamp");
        assert_eq!(replayed.description, "Steel");
        assert_eq!(replayed.sku, "SKU-42");
        assert!(replayed.uncommitted_events().is_empty());
    }
}
