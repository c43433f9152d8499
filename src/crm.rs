//! Entry point tying the entity services to one store.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analytics::{self, CampaignSummary, DashboardSummary, RevenuePoint, SubscriptionPoint};
use crate::campaigns::Campaigns;
use crate::collection::{Collection, Record};
use crate::contacts::Contacts;
use crate::error::Result;
use crate::fixtures;
use crate::models::{Contact, EmailCampaign, Product, Purchase, Subscription};
use crate::products::Products;
use crate::purchases::Purchases;
use crate::reports::{self, DateRange, Report};
use crate::settings::{Settings, SettingsService, SETTINGS_KEY};
use crate::storage::Storage;
use crate::subscriptions::Subscriptions;

/// Store keys of every collection, in load order.
pub const COLLECTIONS: [&str; 6] = [
    Contact::COLLECTION,
    Subscription::COLLECTION,
    Product::COLLECTION,
    Purchase::COLLECTION,
    EmailCampaign::COLLECTION,
    SETTINGS_KEY,
];

fn nothing<T>() -> Vec<T> {
    Vec::new()
}

fn seed<T>(enabled: bool, fixtures: fn() -> Vec<T>) -> fn() -> Vec<T> {
    if enabled {
        fixtures
    } else {
        nothing
    }
}

/// Cheap to clone; every clone shares the same store.
#[derive(Clone)]
pub struct Crm {
    storage: Storage,
    contacts: Contacts,
    products: Products,
    subscriptions: Subscriptions,
    purchases: Purchases,
    campaigns: Campaigns,
    settings: SettingsService,
}

impl Crm {
    /// With `seed_fixtures`, collections that were never written start out
    /// holding the bundled sample data; otherwise they start empty.
    pub fn new(storage: Storage, seed_fixtures: bool) -> Self {
        let contacts = Contacts::new(
            storage.clone(),
            seed(seed_fixtures, fixtures::contacts),
        );
        let products = Products::new(
            storage.clone(),
            seed(seed_fixtures, fixtures::products),
        );
        let subscriptions = Subscriptions::new(
            storage.clone(),
            seed(seed_fixtures, fixtures::subscriptions),
            contacts.clone(),
        );
        let purchases = Purchases::new(
            storage.clone(),
            seed(seed_fixtures, fixtures::purchases),
            contacts.clone(),
            products.clone(),
        );
        let campaigns = Campaigns::new(
            storage.clone(),
            seed(seed_fixtures, fixtures::campaigns),
            contacts.clone(),
            subscriptions.clone(),
            purchases.clone(),
        );
        let settings = SettingsService::new(storage.clone(), fixtures::settings);
        Self {
            storage,
            contacts,
            products,
            subscriptions,
            purchases,
            campaigns,
            settings,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    pub fn products(&self) -> &Products {
        &self.products
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn purchases(&self) -> &Purchases {
        &self.purchases
    }

    pub fn campaigns(&self) -> &Campaigns {
        &self.campaigns
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn campaign_summary(&self) -> Result<CampaignSummary> {
        Ok(analytics::campaign_summary(&self.campaigns.list()?))
    }

    pub fn revenue_series(&self) -> Result<Vec<RevenuePoint>> {
        Ok(analytics::revenue_series(&self.purchases.list()?))
    }

    pub fn subscription_series(&self) -> Result<Vec<SubscriptionPoint>> {
        Ok(analytics::subscription_series(&self.subscriptions.list()?))
    }

    pub fn dashboard(&self) -> Result<DashboardSummary> {
        Ok(analytics::dashboard(
            self.contacts.list()?.len(),
            &self.subscriptions.list()?,
            &self.purchases.list()?,
            &self.products.list()?,
            &self.campaigns.list()?,
        ))
    }

    pub fn report(&self, range: DateRange) -> Result<Report> {
        Ok(reports::build_report(
            range,
            Utc::now(),
            &self.contacts.list()?,
            &self.products.list()?,
            &self.subscriptions.list()?,
            &self.purchases.list()?,
        ))
    }

    pub fn export_report(&self, range: DateRange, dir: impl AsRef<Path>) -> Result<PathBuf> {
        reports::write_report(&self.report(range)?, dir)
    }

    /// Overwrite every collection with the bundled fixtures.
    pub fn reset_to_fixtures(&self) -> Result<()> {
        Collection::<Contact>::new(self.storage.clone(), nothing)
            .replace_all(&fixtures::contacts())?;
        Collection::<Subscription>::new(self.storage.clone(), nothing)
            .replace_all(&fixtures::subscriptions())?;
        Collection::<Product>::new(self.storage.clone(), nothing)
            .replace_all(&fixtures::products())?;
        Collection::<Purchase>::new(self.storage.clone(), nothing)
            .replace_all(&fixtures::purchases())?;
        Collection::<EmailCampaign>::new(self.storage.clone(), nothing)
            .replace_all(&fixtures::campaigns())?;
        self.storage.write(SETTINGS_KEY, &fixtures::settings())?;
        self.storage.flush()?;
        info!(collections = COLLECTIONS.len(), "collections reset to fixtures");
        Ok(())
    }

    /// Drop every collection so the next read starts from the seeds.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for key in COLLECTIONS {
            if self.storage.remove(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn current_settings(&self) -> Result<Settings> {
        self.settings.get()
    }
}
