use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::collection::{Collection, Record};
use crate::contacts::Contacts;
use crate::error::{CrmError, Result};
use crate::models::{
    CampaignStatus, CampaignUpdate, DeliveryCounts, EmailCampaign, EmailMetrics, NewCampaign,
    SegmentCriteria,
};
use crate::purchases::Purchases;
use crate::segments::resolve_criteria;
use crate::storage::Storage;
use crate::subscriptions::Subscriptions;

impl Record for EmailCampaign {
    const COLLECTION: &'static str = "campaigns";
    const ENTITY: &'static str = "Campaign";

    fn id(&self) -> &str {
        &self.id
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CrmError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Stamp `sentAt` on the way to `sent`; refuse `scheduled` without a time.
fn apply_status(campaign: &mut EmailCampaign, status: CampaignStatus) -> Result<()> {
    match status {
        CampaignStatus::Scheduled if campaign.scheduled_at.is_none() => {
            return Err(CrmError::Validation(
                "scheduled campaigns need scheduledAt".into(),
            ))
        }
        CampaignStatus::Sent if campaign.sent_at.is_none() => {
            campaign.sent_at = Some(Utc::now());
        }
        _ => {}
    }
    campaign.status = status;
    Ok(())
}

fn check_counts(counts: &DeliveryCounts) -> Result<()> {
    let bounds = [
        ("delivered", counts.delivered, "sent", counts.sent),
        ("opened", counts.opened, "delivered", counts.delivered),
        ("clicked", counts.clicked, "opened", counts.opened),
        ("unsubscribed", counts.unsubscribed, "sent", counts.sent),
    ];
    for (part, n, whole, m) in bounds {
        if n > m {
            return Err(CrmError::Validation(format!(
                "{part} ({n}) cannot exceed {whole} ({m})"
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct Campaigns {
    records: Collection<EmailCampaign>,
    contacts: Contacts,
    subscriptions: Subscriptions,
    purchases: Purchases,
}

impl Campaigns {
    pub fn new(
        storage: Storage,
        seed: fn() -> Vec<EmailCampaign>,
        contacts: Contacts,
        subscriptions: Subscriptions,
        purchases: Purchases,
    ) -> Self {
        Self {
            records: Collection::new(storage, seed),
            contacts,
            subscriptions,
            purchases,
        }
    }

    pub fn list(&self) -> Result<Vec<EmailCampaign>> {
        self.records.all()
    }

    pub fn get(&self, id: &str) -> Result<Option<EmailCampaign>> {
        self.records.get(id)
    }

    /// New campaigns start with zeroed metrics and no recipients, whatever
    /// the caller supplied.
    pub fn create(&self, new: NewCampaign) -> Result<EmailCampaign> {
        let mut campaign = EmailCampaign {
            id: Uuid::new_v4().to_string(),
            name: required("name", &new.name)?,
            subject: required("subject", &new.subject)?,
            content: new.content,
            campaign_type: new.campaign_type,
            status: CampaignStatus::Draft,
            scheduled_at: new.scheduled_at,
            sent_at: None,
            recipients: vec![],
            segment_criteria: new.segment_criteria,
            metrics: EmailMetrics::default(),
        };
        apply_status(&mut campaign, new.status)?;
        let campaign = self.records.insert(campaign)?;
        info!(id = %campaign.id, name = %campaign.name, status = %campaign.status, "campaign created");
        Ok(campaign)
    }

    pub fn update(&self, id: &str, changes: CampaignUpdate) -> Result<Option<EmailCampaign>> {
        self.records.modify(id, |campaign| {
            if let Some(name) = changes.name {
                campaign.name = required("name", &name)?;
            }
            if let Some(subject) = changes.subject {
                campaign.subject = required("subject", &subject)?;
            }
            if let Some(content) = changes.content {
                campaign.content = content;
            }
            if let Some(campaign_type) = changes.campaign_type {
                campaign.campaign_type = campaign_type;
            }
            if let Some(scheduled_at) = changes.scheduled_at {
                campaign.scheduled_at = Some(scheduled_at);
            }
            if let Some(status) = changes.status {
                apply_status(campaign, status)?;
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.records.remove(id)?;
        if removed {
            info!(id, "campaign deleted");
        }
        Ok(removed)
    }

    /// Store delivery counts and recompute the derived rates.
    pub fn record_metrics(&self, id: &str, counts: DeliveryCounts) -> Result<EmailCampaign> {
        check_counts(&counts)?;
        let updated = self
            .records
            .modify(id, |campaign| {
                campaign.metrics = EmailMetrics::from_counts(counts);
                Ok(())
            })?
            .ok_or_else(|| CrmError::not_found(EmailCampaign::ENTITY, id))?;
        info!(
            id,
            sent = counts.sent,
            open_rate = updated.metrics.open_rate,
            "campaign metrics recorded"
        );
        Ok(updated)
    }

    /// Save `criteria` on the campaign and resolve its recipient list from
    /// the current contacts.
    pub fn target(&self, id: &str, criteria: SegmentCriteria) -> Result<EmailCampaign> {
        let contacts = self.contacts.list()?;
        let subscriptions = self.subscriptions.list()?;
        let purchases = self.purchases.list()?;
        let recipients: Vec<String> =
            resolve_criteria(&contacts, &subscriptions, &purchases, &criteria)
                .into_iter()
                .map(|c| c.id.clone())
                .collect();

        let updated = self
            .records
            .modify(id, |campaign| {
                campaign.recipients = recipients;
                campaign.segment_criteria = Some(criteria);
                Ok(())
            })?
            .ok_or_else(|| CrmError::not_found(EmailCampaign::ENTITY, id))?;
        info!(id, recipients = updated.recipients.len(), "campaign targeted");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::{EngagementBand, PlanType};
    use crate::products::Products;
    use chrono::Duration;

    fn service() -> Campaigns {
        let storage = Storage::memory();
        let contacts = Contacts::new(storage.clone(), fixtures::contacts);
        let products = Products::new(storage.clone(), fixtures::products);
        let subscriptions =
            Subscriptions::new(storage.clone(), fixtures::subscriptions, contacts.clone());
        let purchases = Purchases::new(
            storage.clone(),
            fixtures::purchases,
            contacts.clone(),
            products,
        );
        Campaigns::new(storage, fixtures::campaigns, contacts, subscriptions, purchases)
    }

    fn draft(name: &str) -> NewCampaign {
        NewCampaign {
            name: name.into(),
            subject: "CPD hours are due".into(),
            content: "Reminder".into(),
            ..NewCampaign::default()
        }
    }

    #[test]
    fn test_create_starts_with_zero_metrics() {
        let campaigns = service();
        let campaign = campaigns.create(draft("January reminder")).unwrap();
        assert_eq!(campaign.metrics, EmailMetrics::default());
        assert!(campaign.recipients.is_empty());
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaigns.list().unwrap().len(), 3);
    }

    #[test]
    fn test_scheduled_needs_a_time() {
        let campaigns = service();
        let err = campaigns
            .create(NewCampaign {
                status: CampaignStatus::Scheduled,
                ..draft("Later")
            })
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));

        let scheduled = campaigns
            .create(NewCampaign {
                status: CampaignStatus::Scheduled,
                scheduled_at: Some(Utc::now() + Duration::days(2)),
                ..draft("Later")
            })
            .unwrap();
        assert_eq!(scheduled.status, CampaignStatus::Scheduled);
    }

    #[test]
    fn test_sending_stamps_sent_at() {
        let campaigns = service();
        let campaign = campaigns.create(draft("Now")).unwrap();
        assert!(campaign.sent_at.is_none());
        let sent = campaigns
            .update(
                &campaign.id,
                CampaignUpdate {
                    status: Some(CampaignStatus::Sent),
                    ..CampaignUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(sent.sent_at.is_some());
        assert!(campaigns.update("missing", CampaignUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn test_record_metrics_recomputes_rates() {
        let campaigns = service();
        let campaign = campaigns.create(draft("Counts")).unwrap();
        let updated = campaigns
            .record_metrics(
                &campaign.id,
                DeliveryCounts {
                    sent: 200,
                    delivered: 200,
                    opened: 100,
                    clicked: 25,
                    unsubscribed: 3,
                    bounced: 0,
                },
            )
            .unwrap();
        assert_eq!(updated.metrics.open_rate, 50.0);
        assert_eq!(updated.metrics.click_rate, 25.0);
        assert_eq!(updated.metrics.unsubscribe_rate, 1.5);

        let impossible = DeliveryCounts {
            sent: 10,
            delivered: 20,
            ..DeliveryCounts::default()
        };
        assert!(campaigns.record_metrics(&campaign.id, impossible).is_err());
        assert!(matches!(
            campaigns.record_metrics("missing", DeliveryCounts::default()),
            Err(CrmError::NotFound { .. })
        ));
    }

    #[test]
    fn test_target_resolves_recipients() {
        let campaigns = service();
        let campaign = campaigns.create(draft("Practice owners")).unwrap();
        let targeted = campaigns
            .target(
                &campaign.id,
                SegmentCriteria {
                    subscription_types: Some(vec![PlanType::Practice]),
                    engagement_level: Some(EngagementBand::High),
                    ..SegmentCriteria::default()
                },
            )
            .unwrap();
        assert_eq!(targeted.recipients, vec!["2".to_string()]);
        assert!(targeted.segment_criteria.is_some());

        let stored = campaigns.get(&campaign.id).unwrap().unwrap();
        assert_eq!(stored.recipients, targeted.recipients);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let campaigns = service();
        assert!(campaigns.delete("camp_1").unwrap());
        assert!(!campaigns.delete("camp_1").unwrap());
        assert_eq!(campaigns.list().unwrap().len(), 1);
    }
}
