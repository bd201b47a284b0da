//! Sample catalog for development databases.
//!
//! A catalog file looks like:
//!
//! ```yaml
//! categories:
//!   - name: Kitchen
//!     description: Cookware and tableware
//! products:
//!   - sku: MUG-01
//!     name: Stoneware Mug
//!     price: "14.00"
//!     inventory: 40
//!     category: kitchen
//! ```
//!
//! Quote prices so they are read as exact decimals.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ProductSource, SupplierProduct, SyncError, scoped_sku};

const SUPPLIER: &str = "sample";

/// A category to create before importing products.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SampleProduct {
    sku: String,
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    image_url: Option<String>,
    #[serde(default)]
    inventory: i32,
    category: Option<String>,
}

/// Static catalog loaded from YAML or built in.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleCatalog {
    #[serde(default)]
    pub categories: Vec<SampleCategory>,
    #[serde(default)]
    products: Vec<SampleProduct>,
}

impl SampleCatalog {
    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or isn't a valid catalog.
    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Parse` if the text isn't a valid catalog.
    pub fn from_yaml(text: &str) -> Result<Self, SyncError> {
        serde_yaml::from_str(text)
            .map_err(|e| SyncError::Parse(format!("Invalid sample catalog: {e}")))
    }

    /// The catalog shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Parse` if the embedded catalog is malformed.
    pub fn builtin() -> Result<Self, SyncError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Number of products in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ProductSource for SampleCatalog {
    fn name(&self) -> &str {
        SUPPLIER
    }

    async fn fetch_products(&self) -> Result<Vec<SupplierProduct>, SyncError> {
        Ok(self
            .products
            .iter()
            .map(|p| SupplierProduct {
                supplier: SUPPLIER.to_string(),
                supplier_sku: scoped_sku(SUPPLIER, &p.sku),
                name: p.name.clone(),
                description: p.description.clone(),
                price: p.price,
                compare_at_price: p.compare_at_price,
                image_url: p.image_url.clone(),
                affiliate_url: None,
                inventory: p.inventory,
                category_slug: p.category.clone(),
            })
            .collect())
    }
}

const BUILTIN_CATALOG: &str = r#"
categories:
  - name: Kitchen
    description: Cookware, tableware and pantry basics
  - name: Home
    description: Lighting, textiles and decor
  - name: Outdoors
    description: Gear for trails and backyards

products:
  - sku: MUG-01
    name: Stoneware Mug
    description: Hand-glazed 350 ml mug, dishwasher safe.
    price: "14.00"
    inventory: 40
    category: kitchen
  - sku: KNIFE-08
    name: Carbon Steel Chef Knife
    description: High-carbon steel blade with a walnut handle.
    price: "59.00"
    compare_at_price: "79.00"
    inventory: 12
    category: kitchen
  - sku: BOARD-02
    name: End-Grain Cutting Board
    description: Maple board finished with food-safe oil.
    price: "45.50"
    inventory: 8
    category: kitchen
  - sku: THROW-03
    name: Wool Throw Blanket
    description: Woven merino throw, 130 x 170 cm.
    price: "89.00"
    inventory: 15
    category: home
  - sku: LAMP-04
    name: Brass Table Lamp
    description: Dimmable lamp with a linen shade.
    price: "120.00"
    inventory: 5
    category: home
  - sku: CANDLE-05
    name: Cedar Candle
    description: Soy wax candle, 40 hour burn time.
    price: "18.00"
    inventory: 60
    category: home
  - sku: BOTTLE-06
    name: Insulated Water Bottle
    description: Keeps drinks cold for 24 hours.
    price: "27.00"
    inventory: 35
    category: outdoors
  - sku: LANTERN-07
    name: Rechargeable Lantern
    description: USB-C lantern with three brightness levels.
    price: "39.00"
    compare_at_price: "49.00"
    inventory: 0
    category: outdoors
"#;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sync::normalize;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = SampleCatalog::builtin().unwrap();
        assert_eq!(catalog.categories.len(), 3);
        assert_eq!(catalog.len(), 8);
    }

    #[tokio::test]
    async fn test_builtin_products_are_importable() {
        let products = SampleCatalog::builtin().unwrap().fetch_products().await.unwrap();
        assert!(products.iter().all(|p| p.supplier == "sample"));
        assert!(products.iter().all(|p| p.supplier_sku.starts_with("sample-")));
        assert!(products.into_iter().all(|p| normalize(p).is_some()));
    }

    #[test]
    fn test_from_yaml() {
        let catalog = SampleCatalog::from_yaml(
            r#"
products:
  - sku: A-1
    name: Tea Towel
    price: "9.50"
"#,
        )
        .unwrap();
        assert!(catalog.categories.is_empty());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.products[0].price, "9.50".parse::<Decimal>().unwrap());
        assert_eq!(catalog.products[0].inventory, 0);
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(matches!(
            SampleCatalog::from_yaml("products: 12"),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = SampleCatalog::from_file(Path::new("/nonexistent/catalog.yaml"));
        assert!(matches!(result, Err(SyncError::Io(_))));
    }
}
