use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collection::{Collection, Record};
use crate::contacts::{Contacts, Link};
use crate::error::{CrmError, Result};
use crate::models::{
    check_amount, NewSubscription, PlanType, Subscription, SubscriptionStatus, SubscriptionUpdate,
    DEFAULT_PRACTICE_SEATS,
};
use crate::storage::Storage;

impl Record for Subscription {
    const COLLECTION: &'static str = "subscriptions";
    const ENTITY: &'static str = "Subscription";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Individual plans are always capped at one seat; a different request is
/// normalized (and logged) rather than rejected. Practice plans need at
/// least one seat.
fn seat_cap(plan: PlanType, requested: Option<u32>) -> Result<u32> {
    match plan {
        PlanType::Individual => {
            if let Some(n) = requested.filter(|n| *n != 1) {
                warn!(requested = n, "individual plans hold one seat, normalizing");
            }
            Ok(1)
        }
        PlanType::Practice => match requested.unwrap_or(DEFAULT_PRACTICE_SEATS) {
            0 => Err(CrmError::Validation(
                "practice plans need at least one seat".into(),
            )),
            n => Ok(n),
        },
    }
}

fn check_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CrmError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct Subscriptions {
    records: Collection<Subscription>,
    contacts: Contacts,
}

impl Subscriptions {
    pub fn new(storage: Storage, seed: fn() -> Vec<Subscription>, contacts: Contacts) -> Self {
        Self {
            records: Collection::new(storage, seed),
            contacts,
        }
    }

    pub fn list(&self) -> Result<Vec<Subscription>> {
        self.records.all()
    }

    pub fn get(&self, id: &str) -> Result<Option<Subscription>> {
        self.records.get(id)
    }

    pub fn for_contact(&self, contact_id: &str) -> Result<Vec<Subscription>> {
        Ok(self
            .records
            .all()?
            .into_iter()
            .filter(|s| s.contact_id == contact_id)
            .collect())
    }

    pub fn create(&self, new: NewSubscription) -> Result<Subscription> {
        if new.contact_id.trim().is_empty() {
            return Err(CrmError::Validation("contactId is required".into()));
        }
        let amount = check_amount("amount", new.amount)?;
        let start_date = new.start_date.unwrap_or_else(Utc::now);
        let renewal_date = new.resolved_renewal(start_date);
        if renewal_date < start_date {
            return Err(CrmError::Validation(
                "renewalDate must not be before startDate".into(),
            ));
        }
        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            max_team_members: seat_cap(new.plan, new.max_team_members)?,
            contact_id: new.contact_id,
            plan: new.plan,
            status: new.status,
            start_date,
            renewal_date,
            amount,
            currency: new.currency,
            payment_method: new.payment_method,
            parent_subscription_id: new.parent_subscription_id,
            team_members: vec![],
        };
        let subscription = self.records.insert(subscription)?;
        self.contacts
            .link(&subscription.contact_id, Link::Subscription, &subscription.id)?;
        info!(
            id = %subscription.id,
            contact = %subscription.contact_id,
            plan = %subscription.plan,
            status = %subscription.status,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Field edits. A status change goes through the same lifecycle check
    /// as [`Subscriptions::transition`].
    pub fn update(&self, id: &str, changes: SubscriptionUpdate) -> Result<Option<Subscription>> {
        self.records.modify(id, |sub| {
            if let Some(status) = changes.status {
                check_transition(sub.status, status)?;
                sub.status = status;
            }
            let plan = changes.plan.unwrap_or(sub.plan);
            if plan == PlanType::Individual && !sub.team_members.is_empty() {
                return Err(CrmError::Validation(
                    "remove team members before moving to an individual plan".into(),
                ));
            }
            let requested = match (sub.plan, plan) {
                (PlanType::Individual, PlanType::Practice) => changes.max_team_members,
                _ => changes.max_team_members.or(Some(sub.max_team_members)),
            };
            let cap = seat_cap(plan, requested)?;
            if (cap as usize) < sub.team_members.len() {
                return Err(CrmError::Validation(format!(
                    "{} team members exceed the requested cap of {cap}",
                    sub.team_members.len()
                )));
            }
            sub.plan = plan;
            sub.max_team_members = cap;

            if let Some(start_date) = changes.start_date {
                sub.start_date = start_date;
            }
            if let Some(renewal_date) = changes.renewal_date {
                sub.renewal_date = renewal_date;
            }
            if sub.renewal_date < sub.start_date {
                return Err(CrmError::Validation(
                    "renewalDate must not be before startDate".into(),
                ));
            }
            if let Some(amount) = changes.amount {
                sub.amount = check_amount("amount", amount)?;
            }
            if let Some(currency) = changes.currency {
                sub.currency = currency;
            }
            if let Some(payment_method) = changes.payment_method {
                sub.payment_method = payment_method;
            }
            if let Some(parent) = changes.parent_subscription_id {
                sub.parent_subscription_id = parent;
            }
            Ok(())
        })
    }

    /// Move along `pending -> active -> {cancelled, expired}`.
    pub fn transition(&self, id: &str, status: SubscriptionStatus) -> Result<Subscription> {
        let mut previous = None;
        let updated = self.records.modify(id, |sub| {
            check_transition(sub.status, status)?;
            previous = Some(sub.status);
            sub.status = status;
            Ok(())
        })?;
        let updated = updated.ok_or_else(|| CrmError::not_found(Subscription::ENTITY, id))?;
        if let Some(from) = previous {
            info!(id, %from, to = %status, "subscription status changed");
        }
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.records.remove(id)?;
        if removed {
            info!(id, "subscription deleted");
        }
        Ok(removed)
    }

    /// Give a contact a seat on a practice plan. Adding an existing member
    /// is a no-op.
    pub fn add_team_member(&self, id: &str, contact_id: &str) -> Result<Subscription> {
        let updated = self.records.modify(id, |sub| {
            if sub.plan != PlanType::Practice {
                return Err(CrmError::Validation(
                    "only practice plans have team members".into(),
                ));
            }
            if sub.team_members.iter().any(|m| m == contact_id) {
                return Ok(());
            }
            if sub.seats_left() == 0 {
                return Err(CrmError::TeamFull {
                    id: sub.id.clone(),
                    max: sub.max_team_members,
                });
            }
            sub.team_members.push(contact_id.to_string());
            Ok(())
        })?;
        let updated = updated.ok_or_else(|| CrmError::not_found(Subscription::ENTITY, id))?;
        info!(id, contact = contact_id, seats_left = updated.seats_left(), "team member added");
        Ok(updated)
    }

    pub fn remove_team_member(&self, id: &str, contact_id: &str) -> Result<Subscription> {
        self.records
            .modify(id, |sub| {
                sub.team_members.retain(|m| m != contact_id);
                Ok(())
            })?
            .ok_or_else(|| CrmError::not_found(Subscription::ENTITY, id))
    }
}
