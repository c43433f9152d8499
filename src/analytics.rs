//! Aggregates for the dashboard: campaign rates, monthly growth series and
//! the headline summary.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{
    EmailCampaign, PlanType, Product, Purchase, PurchaseStatus, Subscription,
};
use crate::timestamp::month_label;

/// Round half-up to one decimal place.
///
/// The value is first snapped to six decimals so that binary noise such as
/// `55.04999999999999` still rounds as the `55.05` it stands for.
pub fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    // The micro-unit snap overflows an i64 near 9.2e12; past 1e15 an f64
    // cannot hold tenths anyway.
    if value.abs() >= 1e15 {
        return value;
    }
    if value.abs() >= 1e12 {
        return (value * 10.0).round() / 10.0;
    }
    let micros = (value * 1_000_000.0).round() as i64;
    let tenths = if micros >= 0 {
        (micros + 50_000).div_euclid(100_000)
    } else {
        -((-micros + 50_000).div_euclid(100_000))
    };
    tenths as f64 / 10.0
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRates {
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
}

/// Unweighted mean of each rate across campaigns, one decimal. Empty input
/// yields zeros.
pub fn average_rates(campaigns: &[EmailCampaign]) -> CampaignRates {
    if campaigns.is_empty() {
        return CampaignRates::default();
    }
    let n = campaigns.len() as f64;
    let mean = |rate: fn(&EmailCampaign) -> f64| {
        round_to_tenth(campaigns.iter().map(rate).sum::<f64>() / n)
    };
    CampaignRates {
        open_rate: mean(|c| c.metrics.open_rate),
        click_rate: mean(|c| c.metrics.click_rate),
        unsubscribe_rate: mean(|c| c.metrics.unsubscribe_rate),
    }
}

pub fn total_sent(campaigns: &[EmailCampaign]) -> u64 {
    campaigns.iter().map(|c| c.metrics.sent).sum()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaigns: usize,
    pub total_sent: u64,
    #[serde(flatten)]
    pub rates: CampaignRates,
}

pub fn campaign_summary(campaigns: &[EmailCampaign]) -> CampaignSummary {
    CampaignSummary {
        campaigns: campaigns.len(),
        total_sent: total_sent(campaigns),
        rates: average_rates(campaigns),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: f64,
}

/// Completed purchase revenue per `YYYY-MM` of the purchase date, ascending.
pub fn revenue_series(purchases: &[Purchase]) -> Vec<RevenuePoint> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for purchase in purchases
        .iter()
        .filter(|p| p.status == PurchaseStatus::Completed)
    {
        *buckets.entry(month_label(&purchase.purchase_date)).or_default() += purchase.amount;
    }
    buckets
        .into_iter()
        .map(|(date, revenue)| RevenuePoint { date, revenue })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPoint {
    pub date: String,
    pub individual: u32,
    pub practice: u32,
}

/// Subscription counts per `YYYY-MM` of the renewal date, split by plan.
pub fn subscription_series(subscriptions: &[Subscription]) -> Vec<SubscriptionPoint> {
    let mut buckets: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for sub in subscriptions {
        let bucket = buckets.entry(month_label(&sub.renewal_date)).or_default();
        match sub.plan {
            PlanType::Individual => bucket.0 += 1,
            PlanType::Practice => bucket.1 += 1,
        }
    }
    buckets
        .into_iter()
        .map(|(date, (individual, practice))| SubscriptionPoint {
            date,
            individual,
            practice,
        })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductSales {
    pub product: Product,
    pub sales: usize,
    pub revenue: f64,
}

/// Completed sales per catalog product, best sellers first. Ties keep
/// catalog order.
pub fn product_sales<'a, I>(products: &[Product], purchases: I) -> Vec<ProductSales>
where
    I: IntoIterator<Item = &'a Purchase>,
{
    let mut tally: HashMap<&str, (usize, f64)> = HashMap::new();
    for purchase in purchases
        .into_iter()
        .filter(|p| p.status == PurchaseStatus::Completed)
    {
        let entry = tally.entry(purchase.product_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += purchase.amount;
    }
    let mut rows: Vec<ProductSales> = products
        .iter()
        .map(|product| {
            let (sales, revenue) = tally.get(product.id.as_str()).copied().unwrap_or_default();
            ProductSales {
                product: product.clone(),
                sales,
                revenue,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.sales.cmp(&a.sales));
    rows
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_contacts: usize,
    pub active_subscriptions: usize,
    /// Revenue of the latest month with completed purchases.
    pub monthly_revenue: f64,
    pub email_open_rate: f64,
    pub recent_purchases: Vec<Purchase>,
    pub top_products: Vec<ProductSales>,
    pub subscription_growth: Vec<SubscriptionPoint>,
    pub revenue_growth: Vec<RevenuePoint>,
}

const RECENT_PURCHASES: usize = 5;
const TOP_PRODUCTS: usize = 3;

pub fn dashboard(
    contact_count: usize,
    subscriptions: &[Subscription],
    purchases: &[Purchase],
    products: &[Product],
    campaigns: &[EmailCampaign],
) -> DashboardSummary {
    let revenue_growth = revenue_series(purchases);
    let mut recent = purchases.to_vec();
    recent.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
    recent.truncate(RECENT_PURCHASES);
    let mut top_products = product_sales(products, purchases);
    top_products.truncate(TOP_PRODUCTS);

    DashboardSummary {
        total_contacts: contact_count,
        active_subscriptions: subscriptions.iter().filter(|s| s.is_active()).count(),
        monthly_revenue: revenue_growth.last().map_or(0.0, |p| p.revenue),
        email_open_rate: average_rates(campaigns).open_rate,
        recent_purchases: recent,
        top_products,
        subscription_growth: subscription_series(subscriptions),
        revenue_growth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::EmailMetrics;

    fn with_open_rate(rate: f64) -> EmailCampaign {
        let mut campaign = fixtures::campaigns().remove(0);
        campaign.metrics = EmailMetrics {
            open_rate: rate,
            ..EmailMetrics::default()
        };
        campaign
    }

    #[test]
    fn test_round_to_tenth_is_half_up() {
        assert_eq!(round_to_tenth(55.05), 55.1);
        assert_eq!(round_to_tenth((60.1 + 50.0) / 2.0), 55.1);
        assert_eq!(round_to_tenth(0.04), 0.0);
        assert_eq!(round_to_tenth(0.05), 0.1);
        assert_eq!(round_to_tenth(14.975), 15.0);
        assert_eq!(round_to_tenth(f64::NAN), 0.0);
        assert_eq!(round_to_tenth(2e12 + 0.5), 2e12 + 0.5);
        assert_eq!(round_to_tenth(-1e15), -1e15);
        assert_eq!(round_to_tenth(f64::MAX), f64::MAX);
    }

    #[test]
    fn test_average_open_rate_of_two_campaigns() {
        let rates = average_rates(&[with_open_rate(60.1), with_open_rate(50.0)]);
        assert_eq!(rates.open_rate, 55.1);
        assert_eq!(rates.click_rate, 0.0);
    }

    #[test]
    fn test_average_of_no_campaigns_is_zero() {
        let rates = average_rates(&[]);
        assert_eq!(rates, CampaignRates::default());
        assert!(!rates.open_rate.is_nan());
        assert_eq!(total_sent(&[]), 0);
    }

    #[test]
    fn test_campaign_summary_over_fixtures() {
        let summary = campaign_summary(&fixtures::campaigns());
        assert_eq!(summary.total_sent, 2650);
        assert_eq!(summary.rates.open_rate, 55.1);
        assert_eq!(summary.rates.click_rate, 20.4);
        assert_eq!(summary.rates.unsubscribe_rate, 0.8);
    }

    #[test]
    fn test_revenue_series_buckets_by_month() {
        let mut purchases = fixtures::purchases();
        let mut refunded = purchases[0].clone();
        refunded.id = "pur_3".into();
        refunded.status = PurchaseStatus::Refunded;
        purchases.push(refunded);
        let mut same_month = purchases[0].clone();
        same_month.id = "pur_4".into();
        same_month.amount = 1.0;
        purchases.push(same_month);

        let series = revenue_series(&purchases);
        assert_eq!(
            series,
            vec![
                RevenuePoint { date: "2024-03".into(), revenue: 899.0 },
                RevenuePoint { date: "2024-11".into(), revenue: 200.0 },
            ]
        );
    }

    #[test]
    fn test_subscription_series_splits_plans() {
        let series = subscription_series(&fixtures::subscriptions());
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2025-01");
        assert_eq!((series[0].individual, series[0].practice), (1, 0));
        assert_eq!((series[1].individual, series[1].practice), (0, 1));
    }

    #[test]
    fn test_dashboard_summary() {
        let summary = dashboard(
            3,
            &fixtures::subscriptions(),
            &fixtures::purchases(),
            &fixtures::products(),
            &fixtures::campaigns(),
        );
        assert_eq!(summary.active_subscriptions, 2);
        assert_eq!(summary.monthly_revenue, 199.0);
        assert_eq!(summary.email_open_rate, 55.1);
        assert_eq!(summary.recent_purchases[0].id, "pur_1");
        assert_eq!(summary.top_products.len(), 3);
        assert_eq!(summary.top_products[2].sales, 0);
    }
}
