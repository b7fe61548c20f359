//! Shared test helpers for event store integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use cairn_core::aggregate::{Aggregate, AggregateBase, AggregateType};
use cairn_core::error::DomainError;
use cairn_core::event::Event;
use cairn_core::stream::StreamStore;
use cairn_event_store::{AggregateStore, EventStore, StoreConfig};
use cairn_test_support::FixedClock;
use serde::{Deserialize, Serialize};

pub const PRODUCT_CREATED: &str = "ProductCreated";
pub const PRICE_CHANGED: &str = "PriceChanged";

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemCreated {
    pub sku: String,
    pub price: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemRepriced {
    pub price: u64,
}

/// Minimal catalog item used to exercise the stores.
#[derive(Debug)]
pub struct CatalogItem {
    base: AggregateBase,
    pub sku: Option<String>,
    pub price: u64,
    pub history: Vec<String>,
}

impl CatalogItem {
    pub fn new(id: &str) -> Self {
        Self {
            base: AggregateBase::new(id, AggregateType::new("catalog-item")),
            sku: None,
            price: 0,
            history: Vec::new(),
        }
    }

    pub fn create(&mut self, sku: &str, price: u64) -> Result<(), DomainError> {
        let event = Event::for_aggregate(&*self, PRODUCT_CREATED, &FixedClock::standard())
            .with_json_data(&ItemCreated {
                sku: sku.to_owned(),
                price,
            })?;
        self.apply(event)
    }

    pub fn reprice(&mut self, price: u64) -> Result<(), DomainError> {
        let event = Event::for_aggregate(&*self, PRICE_CHANGED, &FixedClock::standard())
            .with_json_data(&ItemRepriced { price })?;
        self.apply(event)
    }
}

impl Aggregate for CatalogItem {
    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, event: &Event) -> Result<(), DomainError> {
        match event.event_type.as_str() {
            PRODUCT_CREATED => {
                let created: ItemCreated = event.json_data()?;
                self.sku = Some(created.sku);
                self.price = created.price;
            }
            PRICE_CHANGED => {
                let repriced: ItemRepriced = event.json_data()?;
                self.price = repriced.price;
            }
            other => {
                return Err(DomainError::Validation(format!(
                    "catalog item cannot apply {other}"
                )));
            }
        }
        self.history.push(event.event_type.clone());
        Ok(())
    }
}

pub fn aggregate_store(streams: Arc<dyn StreamStore>) -> AggregateStore {
    AggregateStore::new(streams, &StoreConfig::default())
}

pub fn aggregate_store_with_page_size(
    streams: Arc<dyn StreamStore>,
    page_size: u64,
) -> AggregateStore {
    let config = StoreConfig {
        page_size,
        ..StoreConfig::default()
    };
    AggregateStore::new(streams, &config)
}

pub fn event_store(streams: Arc<dyn StreamStore>) -> EventStore {
    EventStore::new(streams, &StoreConfig::default())
}

/// A raw event addressed to `stream_id`, outside any aggregate.
pub fn raw_event(stream_id: &str, event_type: &str, price: u64) -> Event {
    Event::new(
        stream_id,
        AggregateType::new("catalog-item"),
        event_type,
        &FixedClock::standard(),
    )
    .with_json_data(&ItemRepriced { price })
    .unwrap()
}
