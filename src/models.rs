use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analytics::round_to_tenth;
use crate::error::CrmError;
use crate::timestamp;

/// Declares a closed set of lowercase wire names with `as_str`, `Display`
/// and a case-insensitive `FromStr`.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CrmError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(CrmError::Validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

wire_enum!(
    /// How a contact first reached the business.
    Source {
        Organic => "organic",
        Social => "social",
        Email => "email",
        Referral => "referral",
        Affiliate => "affiliate",
    }
);

impl Source {
    /// Capitalized name used in report breakdowns.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Organic => "Organic",
            Source::Social => "Social",
            Source::Email => "Email",
            Source::Referral => "Referral",
            Source::Affiliate => "Affiliate",
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Organic
    }
}

wire_enum!(
    /// Engagement band; high >= 80, medium in [50, 80), low < 50.
    EngagementBand {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
);

impl EngagementBand {
    pub fn classify(score: u8) -> Self {
        match score {
            80..=u8::MAX => EngagementBand::High,
            50..=79 => EngagementBand::Medium,
            _ => EngagementBand::Low,
        }
    }

    pub fn contains(&self, score: u8) -> bool {
        EngagementBand::classify(score) == *self
    }
}

wire_enum!(
    PlanType {
        Individual => "individual",
        Practice => "practice",
    }
);

impl Default for PlanType {
    fn default() -> Self {
        PlanType::Individual
    }
}

wire_enum!(
    /// Lifecycle: `pending -> active -> {cancelled, expired}`.
    SubscriptionStatus {
        Active => "active",
        Cancelled => "cancelled",
        Expired => "expired",
        Pending => "pending",
    }
);

impl SubscriptionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionStatus::Cancelled | SubscriptionStatus::Expired)
    }

    /// Re-writing the current status is always allowed.
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Pending, Active) | (Active, Cancelled) | (Active, Expired)
            )
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Pending
    }
}

wire_enum!(
    PurchaseStatus {
        Completed => "completed",
        Pending => "pending",
        Refunded => "refunded",
    }
);

impl Default for PurchaseStatus {
    fn default() -> Self {
        PurchaseStatus::Completed
    }
}

wire_enum!(
    ProductType {
        Course => "course",
        Webinar => "webinar",
        Subscription => "subscription",
    }
);

impl Default for ProductType {
    fn default() -> Self {
        ProductType::Course
    }
}

wire_enum!(
    CampaignType {
        Broadcast => "broadcast",
        Automation => "automation",
        Transactional => "transactional",
    }
);

impl Default for CampaignType {
    fn default() -> Self {
        CampaignType::Broadcast
    }
}

wire_enum!(
    CampaignStatus {
        Draft => "draft",
        Scheduled => "scheduled",
        Sent => "sent",
        Paused => "paused",
    }
);

impl Default for CampaignStatus {
    fn default() -> Self {
        CampaignStatus::Draft
    }
}

pub const DEFAULT_CURRENCY: &str = "AUD";
pub const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";
/// Seats on a practice plan when the caller does not say otherwise.
pub const DEFAULT_PRACTICE_SEATS: u32 = 5;
pub const MAX_ENGAGEMENT_SCORE: u8 = 100;

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_string()
}

fn default_true() -> bool {
    true
}

/// Money fields must be finite and non-negative.
pub fn check_amount(field: &str, value: f64) -> Result<f64, CrmError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CrmError::Validation(format!(
            "{field} must be a non-negative amount, got {value}"
        )));
    }
    Ok(value)
}

/// `null` clears an optional field, a missing key leaves it alone.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim, drop blanks and remove duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

// --- Contacts ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_activity: DateTime<Utc>,
    pub engagement_score: u8,
    /// Back-references, kept best effort.
    #[serde(default)]
    pub subscription_ids: Vec<String>,
    #[serde(default)]
    pub purchase_ids: Vec<String>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn engagement_band(&self) -> EngagementBand {
        EngagementBand::classify(self.engagement_score)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Source,
    /// Explicit score in 0..=100; absent means 0.
    #[serde(default)]
    pub engagement_score: Option<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub job_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub company: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub source: Option<Source>,
    pub engagement_score: Option<u8>,
}

// --- Subscriptions ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub contact_id: String,
    #[serde(rename = "type")]
    pub plan: PlanType,
    pub status: SubscriptionStatus,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub start_date: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub renewal_date: DateTime<Utc>,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_subscription_id: Option<String>,
    /// Contact ids of seat holders; practice plans only.
    #[serde(default)]
    pub team_members: Vec<String>,
    pub max_team_members: u32,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn seats_left(&self) -> u32 {
        self.max_team_members
            .saturating_sub(self.team_members.len() as u32)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub contact_id: String,
    #[serde(rename = "type", default)]
    pub plan: PlanType,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    /// Defaults to one year after the start date.
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub renewal_date: Option<DateTime<Utc>>,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub parent_subscription_id: Option<String>,
    #[serde(default)]
    pub max_team_members: Option<u32>,
}

impl NewSubscription {
    pub fn resolved_renewal(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        self.renewal_date
            .unwrap_or_else(|| start.checked_add_months(Months::new(12)).unwrap_or(start))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    #[serde(rename = "type")]
    pub plan: Option<PlanType>,
    pub status: Option<SubscriptionStatus>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub renewal_date: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub parent_subscription_id: Option<Option<String>>,
    pub max_team_members: Option<u32>,
}

// --- Purchases ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub contact_id: String,
    pub product_id: String,
    /// Snapshot of the product name at purchase time.
    pub product_name: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub purchase_date: DateTime<Utc>,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub contact_id: String,
    pub product_id: String,
    /// Taken from the catalog when omitted.
    #[serde(default)]
    pub product_name: Option<String>,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PurchaseStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseUpdate {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub purchase_date: Option<DateTime<Utc>>,
    pub status: Option<PurchaseStatus>,
    pub tags: Option<Vec<String>>,
}

// --- Products ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(rename = "type", default)]
    pub product_type: ProductType,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Default for NewProduct {
    fn default() -> Self {
        Self {
            name: String::new(),
            product_type: ProductType::default(),
            price: 0.0,
            currency: default_currency(),
            description: String::new(),
            tags: vec![],
            is_active: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<ProductType>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

// --- Email campaigns ---

/// Raw delivery counts reported for one campaign send.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCounts {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub unsubscribed: u64,
    pub bounced: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailMetrics {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub unsubscribed: u64,
    pub bounced: u64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
}

impl EmailMetrics {
    /// Rates are percentages to one decimal: opens over delivered, clicks
    /// over opens, unsubscribes over sent. A zero denominator gives 0.
    pub fn from_counts(counts: DeliveryCounts) -> Self {
        Self {
            sent: counts.sent,
            delivered: counts.delivered,
            opened: counts.opened,
            clicked: counts.clicked,
            unsubscribed: counts.unsubscribed,
            bounced: counts.bounced,
            open_rate: percentage(counts.opened, counts.delivered),
            click_rate: percentage(counts.clicked, counts.opened),
            unsubscribe_rate: percentage(counts.unsubscribed, counts.sent),
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to_tenth(part as f64 * 100.0 / whole as f64)
}

/// Recipient selection rules. Present lists are OR-ed internally; present
/// criteria are AND-ed together.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_titles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_types: Option<Vec<PlanType>>,
    /// Product ids with at least one completed purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_history: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_level: Option<EngagementBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<Source>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailCampaign {
    pub id: String,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    #[serde(
        default,
        deserialize_with = "timestamp::option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "timestamp::option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_criteria: Option<SegmentCriteria>,
    #[serde(default)]
    pub metrics: EmailMetrics,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub campaign_type: CampaignType,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub segment_criteria: Option<SegmentCriteria>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub campaign_type: Option<CampaignType>,
    pub status: Option<CampaignStatus>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub scheduled_at: Option<DateTime<Utc>>,
}
