//! Contact filtering and segmentation.
//!
//! Pure functions over in-memory slices. Results keep the input order and
//! borrow from it.

use serde::{Deserialize, Serialize};

use crate::error::{CrmError, Result};
use crate::models::{
    Contact, EngagementBand, PlanType, Purchase, PurchaseStatus, SegmentCriteria, Source,
    Subscription,
};

/// Case-insensitive substring search over name, email and company, combined
/// with an optional exact tag. An empty search matches every contact.
pub fn filter_contacts<'a>(
    contacts: &'a [Contact],
    search: &str,
    tag: Option<&str>,
) -> Vec<&'a Contact> {
    let needle = search.trim().to_lowercase();
    let tag = tag.map(str::trim).filter(|t| !t.is_empty());
    contacts
        .iter()
        .filter(|c| needle.is_empty() || matches_text(c, &needle))
        .filter(|c| tag.map_or(true, |t| c.has_tag(t)))
        .collect()
}

fn matches_text(contact: &Contact, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(&contact.full_name())
        || contains(&contact.email)
        || contact.company.as_deref().is_some_and(contains)
}

/// One-dimension predicate over contacts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "dimension", content = "value", rename_all = "camelCase")]
pub enum Segment {
    Tag(String),
    JobTitle(String),
    Source(Source),
    Engagement(EngagementBand),
}

impl Segment {
    /// Build a segment from the `dimension`/`value` pair used by query strings.
    pub fn parse(dimension: &str, value: &str) -> Result<Self> {
        match dimension.trim() {
            "tag" => Ok(Segment::Tag(value.to_string())),
            "jobTitle" | "job_title" => Ok(Segment::JobTitle(value.to_string())),
            "source" => Ok(Segment::Source(value.parse()?)),
            "engagement" => Ok(Segment::Engagement(value.parse()?)),
            other => Err(CrmError::Validation(format!(
                "unknown segment dimension '{other}'"
            ))),
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Segment::Tag(tag) => contact.has_tag(tag),
            Segment::JobTitle(title) => contact.job_title.as_deref() == Some(title.as_str()),
            Segment::Source(source) => contact.source == *source,
            Segment::Engagement(band) => band.contains(contact.engagement_score),
        }
    }
}

pub fn segment_members<'a>(contacts: &'a [Contact], segment: &Segment) -> Vec<&'a Contact> {
    contacts.iter().filter(|c| segment.matches(c)).collect()
}

pub fn segment_count(contacts: &[Contact], segment: &Segment) -> usize {
    contacts.iter().filter(|c| segment.matches(c)).count()
}

pub fn all_tags(contacts: &[Contact]) -> Vec<String> {
    distinct(contacts.iter().flat_map(|c| c.tags.iter().cloned()))
}

pub fn all_job_titles(contacts: &[Contact]) -> Vec<String> {
    distinct(
        contacts
            .iter()
            .filter_map(|c| c.job_title.clone())
            .filter(|t| !t.is_empty()),
    )
}

pub fn all_sources(contacts: &[Contact]) -> Vec<Source> {
    distinct(contacts.iter().map(|c| c.source))
}

fn distinct<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    #[serde(flatten)]
    pub segment: Segment,
    pub count: usize,
}

/// Every segment that has at least one candidate value, with member counts:
/// tags, job titles and sources in first-seen order, then the three
/// engagement bands.
pub fn catalog_with_counts(contacts: &[Contact]) -> Vec<SegmentSummary> {
    let segments = all_tags(contacts)
        .into_iter()
        .map(Segment::Tag)
        .chain(all_job_titles(contacts).into_iter().map(Segment::JobTitle))
        .chain(all_sources(contacts).into_iter().map(Segment::Source))
        .chain(EngagementBand::ALL.iter().copied().map(Segment::Engagement));
    segments
        .map(|segment| SegmentSummary {
            count: segment_count(contacts, &segment),
            segment,
        })
        .collect()
}

/// Resolve campaign criteria to contacts. Subscription types match any of the
/// contact's subscriptions; purchase history matches completed purchases by
/// product id. Criteria with no fields select everyone.
pub fn resolve_criteria<'a>(
    contacts: &'a [Contact],
    subscriptions: &[Subscription],
    purchases: &[Purchase],
    criteria: &SegmentCriteria,
) -> Vec<&'a Contact> {
    contacts
        .iter()
        .filter(|c| criteria_match(c, subscriptions, purchases, criteria))
        .collect()
}

fn criteria_match(
    contact: &Contact,
    subscriptions: &[Subscription],
    purchases: &[Purchase],
    criteria: &SegmentCriteria,
) -> bool {
    fn any_of<T>(wanted: &Option<Vec<T>>, test: impl Fn(&T) -> bool) -> bool {
        match wanted {
            Some(list) if !list.is_empty() => list.iter().any(test),
            _ => true,
        }
    }

    let plan_held = |plan: &PlanType| {
        subscriptions
            .iter()
            .any(|s| s.contact_id == contact.id && s.plan == *plan)
    };
    let bought = |product_id: &String| {
        purchases.iter().any(|p| {
            p.contact_id == contact.id
                && p.product_id == *product_id
                && p.status == PurchaseStatus::Completed
        })
    };

    any_of(&criteria.tags, |t| contact.has_tag(t))
        && any_of(&criteria.job_titles, |t| contact.job_title.as_ref() == Some(t))
        && any_of(&criteria.source, |s| contact.source == *s)
        && any_of(&criteria.subscription_types, plan_held)
        && any_of(&criteria.purchase_history, bought)
        && criteria
            .engagement_level
            .map_or(true, |band| band.contains(contact.engagement_score))
}
