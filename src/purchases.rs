use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::collection::{Collection, Record};
use crate::contacts::{Contacts, Link};
use crate::error::{CrmError, Result};
use crate::models::{check_amount, normalize_tags, NewPurchase, Purchase, PurchaseUpdate};
use crate::products::Products;
use crate::storage::Storage;

impl Record for Purchase {
    const COLLECTION: &'static str = "purchases";
    const ENTITY: &'static str = "Purchase";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone)]
pub struct Purchases {
    records: Collection<Purchase>,
    contacts: Contacts,
    products: Products,
}

impl Purchases {
    pub fn new(
        storage: Storage,
        seed: fn() -> Vec<Purchase>,
        contacts: Contacts,
        products: Products,
    ) -> Self {
        Self {
            records: Collection::new(storage, seed),
            contacts,
            products,
        }
    }

    pub fn list(&self) -> Result<Vec<Purchase>> {
        self.records.all()
    }

    pub fn get(&self, id: &str) -> Result<Option<Purchase>> {
        self.records.get(id)
    }

    pub fn for_contact(&self, contact_id: &str) -> Result<Vec<Purchase>> {
        Ok(self
            .records
            .all()?
            .into_iter()
            .filter(|p| p.contact_id == contact_id)
            .collect())
    }

    /// Record a purchase. The product name is snapshotted from the catalog
    /// unless given; the contact gets a back-reference when it exists.
    pub fn create(&self, new: NewPurchase) -> Result<Purchase> {
        let product_name = match new.product_name {
            Some(name) => name,
            None => self
                .products
                .get(&new.product_id)?
                .map(|p| p.name)
                .ok_or_else(|| CrmError::not_found("Product", new.product_id.clone()))?,
        };
        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            contact_id: new.contact_id,
            product_id: new.product_id,
            product_name,
            amount: check_amount("amount", new.amount)?,
            currency: new.currency,
            purchase_date: new.purchase_date.unwrap_or_else(Utc::now),
            status: new.status,
            tags: normalize_tags(&new.tags),
        };
        let purchase = self.records.insert(purchase)?;
        self.contacts
            .link(&purchase.contact_id, Link::Purchase, &purchase.id)?;
        info!(
            id = %purchase.id,
            contact = %purchase.contact_id,
            product = %purchase.product_id,
            "purchase recorded"
        );
        Ok(purchase)
    }

    pub fn update(&self, id: &str, changes: PurchaseUpdate) -> Result<Option<Purchase>> {
        self.records.modify(id, |purchase| {
            if let Some(amount) = changes.amount {
                purchase.amount = check_amount("amount", amount)?;
            }
            if let Some(currency) = changes.currency {
                purchase.currency = currency;
            }
            if let Some(purchase_date) = changes.purchase_date {
                purchase.purchase_date = purchase_date;
            }
            if let Some(status) = changes.status {
                purchase.status = status;
            }
            if let Some(tags) = changes.tags {
                purchase.tags = normalize_tags(&tags);
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.records.remove(id)?;
        if removed {
            info!(id, "purchase deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::PurchaseStatus;

    fn service() -> Purchases {
        let storage = Storage::memory();
        let contacts = Contacts::new(storage.clone(), fixtures::contacts);
        let products = Products::new(storage.clone(), fixtures::products);
        Purchases::new(storage, fixtures::purchases, contacts, products)
    }

    #[test]
    fn test_create_snapshots_name_and_links_contact() {
        let purchases = service();
        let purchase = purchases
            .create(NewPurchase {
                contact_id: "3".into(),
                product_id: "prod_2".into(),
                amount: 299.0,
                ..NewPurchase::default()
            })
            .unwrap();
        assert_eq!(purchase.product_name, "Individual Webinar Membership");
        assert_eq!(purchase.status, PurchaseStatus::Completed);

        let emma = purchases.contacts.get("3").unwrap().unwrap();
        assert_eq!(emma.purchase_ids, vec![purchase.id.clone()]);
        assert_eq!(purchases.for_contact("3").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_product_without_name_is_rejected() {
        let purchases = service();
        let result = purchases.create(NewPurchase {
            contact_id: "3".into(),
            product_id: "prod_404".into(),
            amount: 10.0,
            ..NewPurchase::default()
        });
        assert!(matches!(result, Err(CrmError::NotFound { .. })));
    }

    #[test]
    fn test_negative_amount_is_rejected_on_update() {
        let purchases = service();
        let before = purchases.get("pur_1").unwrap().unwrap();
        let err = purchases
            .update(
                "pur_1",
                PurchaseUpdate {
                    amount: Some(-5000.0),
                    ..PurchaseUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
        assert_eq!(purchases.get("pur_1").unwrap().unwrap(), before);

        assert!(purchases
            .update(
                "pur_1",
                PurchaseUpdate {
                    amount: Some(f64::NAN),
                    ..PurchaseUpdate::default()
                },
            )
            .is_err());
    }

    #[test]
    fn test_refund_and_delete() {
        let purchases = service();
        let refunded = purchases
            .update(
                "pur_1",
                PurchaseUpdate {
                    status: Some(PurchaseStatus::Refunded),
                    ..PurchaseUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(refunded.status, PurchaseStatus::Refunded);
        assert!(purchases.delete("pur_1").unwrap());
        assert!(purchases.get("pur_1").unwrap().is_none());
        // Deleting a purchase leaves the contact's back-reference in place.
        let sarah = purchases.contacts.get("1").unwrap().unwrap();
        assert_eq!(sarah.purchase_ids, vec!["pur_1".to_string()]);
    }
}
