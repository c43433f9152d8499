use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::collection::{Collection, Record};
use crate::error::{CrmError, Result};
use crate::models::{normalize_tags, Contact, ContactUpdate, NewContact, MAX_ENGAGEMENT_SCORE};
use crate::segments;
use crate::storage::Storage;

impl Record for Contact {
    const COLLECTION: &'static str = "contacts";
    const ENTITY: &'static str = "Contact";

    fn id(&self) -> &str {
        &self.id
    }
}

fn check_score(score: u8) -> Result<u8> {
    if score > MAX_ENGAGEMENT_SCORE {
        return Err(CrmError::Validation(format!(
            "engagement score must be between 0 and {MAX_ENGAGEMENT_SCORE}, got {score}"
        )));
    }
    Ok(score)
}

fn non_blank(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CrmError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct Contacts {
    records: Collection<Contact>,
}

impl Contacts {
    pub fn new(storage: Storage, seed: fn() -> Vec<Contact>) -> Self {
        Self {
            records: Collection::new(storage, seed),
        }
    }

    pub fn list(&self) -> Result<Vec<Contact>> {
        self.records.all()
    }

    pub fn get(&self, id: &str) -> Result<Option<Contact>> {
        self.records.get(id)
    }

    /// Contacts matching a free-text search and an optional tag.
    pub fn filter(&self, search: &str, tag: Option<&str>) -> Result<Vec<Contact>> {
        let contacts = self.records.all()?;
        Ok(segments::filter_contacts(&contacts, search, tag)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn create(&self, new: NewContact) -> Result<Contact> {
        let now = Utc::now();
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            first_name: non_blank("firstName", new.first_name)?,
            last_name: new.last_name.trim().to_string(),
            email: non_blank("email", new.email)?,
            phone: new.phone,
            job_title: new.job_title,
            company: new.company,
            tags: normalize_tags(&new.tags),
            source: new.source,
            created_at: now,
            last_activity: now,
            engagement_score: check_score(new.engagement_score.unwrap_or(0))?,
            subscription_ids: vec![],
            purchase_ids: vec![],
        };
        let contact = self.records.insert(contact)?;
        info!(id = %contact.id, email = %contact.email, "contact created");
        Ok(contact)
    }

    pub fn update(&self, id: &str, changes: ContactUpdate) -> Result<Option<Contact>> {
        let updated = self.records.modify(id, |contact| {
            if let Some(first_name) = changes.first_name {
                contact.first_name = non_blank("firstName", first_name)?;
            }
            if let Some(last_name) = changes.last_name {
                contact.last_name = last_name.trim().to_string();
            }
            if let Some(email) = changes.email {
                contact.email = non_blank("email", email)?;
            }
            if let Some(phone) = changes.phone {
                contact.phone = phone;
            }
            if let Some(job_title) = changes.job_title {
                contact.job_title = job_title;
            }
            if let Some(company) = changes.company {
                contact.company = company;
            }
            if let Some(tags) = changes.tags {
                contact.tags = normalize_tags(&tags);
            }
            if let Some(source) = changes.source {
                contact.source = source;
            }
            if let Some(score) = changes.engagement_score {
                contact.engagement_score = check_score(score)?;
            }
            Ok(())
        })?;
        if updated.is_some() {
            info!(id, "contact updated");
        }
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.records.remove(id)?;
        if removed {
            info!(id, "contact deleted");
        }
        Ok(removed)
    }

    /// Bump `lastActivity` to now.
    pub fn touch(&self, id: &str) -> Result<Option<Contact>> {
        self.records.modify(id, |contact| {
            contact.last_activity = Utc::now();
            Ok(())
        })
    }

    /// Record a subscription or purchase id on the owning contact. A missing
    /// contact is not an error; references are never enforced.
    pub(crate) fn link(&self, contact_id: &str, link: Link, record_id: &str) -> Result<bool> {
        let linked = self.records.modify(contact_id, |contact| {
            let ids = match link {
                Link::Subscription => &mut contact.subscription_ids,
                Link::Purchase => &mut contact.purchase_ids,
            };
            if !ids.iter().any(|existing| existing == record_id) {
                ids.push(record_id.to_string());
            }
            Ok(())
        })?;
        Ok(linked.is_some())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Link {
    Subscription,
    Purchase,
}
