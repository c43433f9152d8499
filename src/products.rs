use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::collection::{Collection, Record};
use crate::error::{CrmError, Result};
use crate::models::{check_amount, normalize_tags, NewProduct, Product, ProductUpdate};
use crate::storage::Storage;

impl Record for Product {
    const COLLECTION: &'static str = "products";
    const ENTITY: &'static str = "Product";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone)]
pub struct Products {
    records: Collection<Product>,
}

impl Products {
    pub fn new(storage: Storage, seed: fn() -> Vec<Product>) -> Self {
        Self {
            records: Collection::new(storage, seed),
        }
    }

    pub fn list(&self) -> Result<Vec<Product>> {
        self.records.all()
    }

    pub fn get(&self, id: &str) -> Result<Option<Product>> {
        self.records.get(id)
    }

    pub fn create(&self, new: NewProduct) -> Result<Product> {
        if new.name.trim().is_empty() {
            return Err(CrmError::Validation("name is required".into()));
        }
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            product_type: new.product_type,
            price: check_amount("price", new.price)?,
            currency: new.currency,
            description: new.description,
            tags: normalize_tags(&new.tags),
            is_active: new.is_active,
            created_at: Utc::now(),
        };
        let product = self.records.insert(product)?;
        info!(id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub fn update(&self, id: &str, changes: ProductUpdate) -> Result<Option<Product>> {
        self.records.modify(id, |product| {
            if let Some(name) = changes.name {
                if name.trim().is_empty() {
                    return Err(CrmError::Validation("name is required".into()));
                }
                product.name = name.trim().to_string();
            }
            if let Some(product_type) = changes.product_type {
                product.product_type = product_type;
            }
            if let Some(price) = changes.price {
                product.price = check_amount("price", price)?;
            }
            if let Some(currency) = changes.currency {
                product.currency = currency;
            }
            if let Some(description) = changes.description {
                product.description = description;
            }
            if let Some(tags) = changes.tags {
                product.tags = normalize_tags(&tags);
            }
            if let Some(is_active) = changes.is_active {
                product.is_active = is_active;
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.records.remove(id)?;
        if removed {
            info!(id, "product deleted");
        }
        Ok(removed)
    }

    /// Flip `isActive`.
    pub fn toggle_active(&self, id: &str) -> Result<Option<Product>> {
        let toggled = self.records.modify(id, |product| {
            product.is_active = !product.is_active;
            Ok(())
        })?;
        if let Some(product) = &toggled {
            info!(id, active = product.is_active, "product status toggled");
        }
        Ok(toggled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::ProductType;

    #[test]
    fn test_create_update_toggle_delete() {
        let products = Products::new(Storage::memory(), fixtures::products);
        let webinar = products
            .create(NewProduct {
                name: "Dental Radiography Webinar".into(),
                product_type: ProductType::Webinar,
                price: 49.0,
                tags: vec!["DENTAL".into(), "DENTAL".into()],
                ..NewProduct::default()
            })
            .unwrap();
        assert!(webinar.is_active);
        assert_eq!(webinar.tags, vec!["DENTAL".to_string()]);
        assert_eq!(products.list().unwrap().len(), 4);

        let repriced = products
            .update(
                &webinar.id,
                ProductUpdate {
                    price: Some(59.0),
                    ..ProductUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(repriced.price, 59.0);

        let toggled = products.toggle_active(&webinar.id).unwrap().unwrap();
        assert!(!toggled.is_active);
        assert!(products.toggle_active("missing").unwrap().is_none());

        assert!(products.delete(&webinar.id).unwrap());
        assert!(!products.delete(&webinar.id).unwrap());
    }

    #[test]
    fn test_rejects_negative_price() {
        let products = Products::new(Storage::memory(), fixtures::products);
        let result = products.update(
            "prod_1",
            ProductUpdate {
                price: Some(-1.0),
                ..ProductUpdate::default()
            },
        );
        assert!(result.is_err());
        assert_eq!(products.get("prod_1").unwrap().unwrap().price, 199.0);
    }
}
