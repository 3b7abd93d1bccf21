// file: src/api/product.rs
// version: 1.0.0
// guid: f6b9c2d5-8e1a-4470-93f6-a9b2c5d8e1f4

//! Product catalog listing

use super::client::RobotClient;
use crate::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    product: ProductRecord,
}

/// One orderable product with its per-location prices
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    #[serde(rename = "location")]
    pub locations: Vec<String>,
    pub prices: Vec<PriceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRecord {
    pub location: String,
    pub price: Money,
    pub price_setup: Money,
}

/// Provider prices are decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct Money {
    pub gross: String,
}

impl ProductRecord {
    /// Price entry for a location, if the product is offered there
    pub fn price_at(&self, location: &str) -> Option<&PriceRecord> {
        self.prices.iter().find(|p| p.location == location)
    }

    /// Setup fee at a location as a number; None when unoffered or unparsable
    pub fn setup_fee_at(&self, location: &str) -> Option<f64> {
        self.price_at(location)
            .and_then(|p| p.price_setup.gross.parse::<f64>().ok())
    }
}

/// Fetch the product catalog
pub async fn list_products(client: &RobotClient) -> Result<Vec<ProductRecord>> {
    let value = client.get("/order/server/product").await?;
    let envelopes: Vec<ProductEnvelope> = serde_json::from_value(value)?;
    Ok(envelopes.into_iter().map(|e| e.product).collect())
}
