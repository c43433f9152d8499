//! Exportable business report.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::analytics::product_sales;
use crate::error::{CrmError, Result};
use crate::models::{Contact, PlanType, Product, Purchase, Source, Subscription, SubscriptionStatus};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl DateRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Week => "7d",
            DateRange::Month => "30d",
            DateRange::Quarter => "90d",
            DateRange::Year => "1y",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            DateRange::Week => Duration::days(7),
            DateRange::Month => Duration::days(30),
            DateRange::Quarter => Duration::days(90),
            DateRange::Year => Duration::days(365),
        }
    }

    /// Start of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "7d" => Ok(DateRange::Week),
            "30d" => Ok(DateRange::Month),
            "90d" => Ok(DateRange::Quarter),
            "1y" => Ok(DateRange::Year),
            other => Err(CrmError::Validation(format!(
                "unknown date range '{other}', expected 7d, 30d, 90d or 1y"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub total_contacts: usize,
    pub total_products: usize,
    pub total_subscriptions: usize,
    pub active_subscriptions: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductPerformance {
    pub name: String,
    pub sales: usize,
    pub revenue: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Breakdown {
    pub name: String,
    pub value: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub date_range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub metrics: ReportMetrics,
    pub product_performance: Vec<ProductPerformance>,
    pub source_breakdown: Vec<Breakdown>,
    pub subscription_breakdown: Vec<Breakdown>,
}

impl Report {
    /// `veteducation-report-{range}-{YYYY-MM-DD}.json`
    pub fn file_name(&self) -> String {
        format!(
            "veteducation-report-{}-{}.json",
            self.date_range,
            self.generated_at.format("%Y-%m-%d")
        )
    }
}

pub fn build_report(
    range: DateRange,
    now: DateTime<Utc>,
    contacts: &[Contact],
    products: &[Product],
    subscriptions: &[Subscription],
    purchases: &[Purchase],
) -> Report {
    let since = range.since(now);
    let in_range = purchases
        .iter()
        .filter(|p| p.purchase_date >= since && p.purchase_date <= now);
    let product_performance = product_sales(products, in_range)
        .into_iter()
        .map(|row| ProductPerformance {
            name: row.product.name,
            sales: row.sales,
            revenue: row.revenue,
        })
        .collect();

    let source_breakdown = Source::ALL
        .iter()
        .map(|source| Breakdown {
            name: source.label().to_string(),
            value: contacts.iter().filter(|c| c.source == *source).count(),
        })
        .collect();

    let active_of = |plan: PlanType| {
        count_where(subscriptions, |s| s.plan == plan && s.status == SubscriptionStatus::Active)
    };
    let subscription_breakdown = vec![
        Breakdown {
            name: "Individual Active".into(),
            value: active_of(PlanType::Individual),
        },
        Breakdown {
            name: "Practice Active".into(),
            value: active_of(PlanType::Practice),
        },
        Breakdown {
            name: "Cancelled".into(),
            value: count_where(subscriptions, |s| s.status == SubscriptionStatus::Cancelled),
        },
        Breakdown {
            name: "Expired".into(),
            value: count_where(subscriptions, |s| s.status == SubscriptionStatus::Expired),
        },
    ];

    Report {
        date_range: range,
        generated_at: now,
        metrics: ReportMetrics {
            total_contacts: contacts.len(),
            total_products: products.len(),
            total_subscriptions: subscriptions.len(),
            active_subscriptions: subscriptions.iter().filter(|s| s.is_active()).count(),
        },
        product_performance,
        source_breakdown,
        subscription_breakdown,
    }
}

fn count_where(subscriptions: &[Subscription], pred: impl Fn(&Subscription) -> bool) -> usize {
    subscriptions.iter().filter(|s| pred(s)).count()
}

/// Write the report as pretty JSON into `dir`, creating it if needed.
pub fn write_report(report: &Report, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report.file_name());
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    info!(path = %path.display(), range = %report.date_range, "report exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::timestamp::date;

    fn fixture_report(range: DateRange, now: DateTime<Utc>) -> Report {
        build_report(
            range,
            now,
            &fixtures::contacts(),
            &fixtures::products(),
            &fixtures::subscriptions(),
            &fixtures::purchases(),
        )
    }

    #[test]
    fn test_parse_date_range() {
        assert_eq!("90d".parse::<DateRange>().unwrap(), DateRange::Quarter);
        assert!("2w".parse::<DateRange>().is_err());
        assert_eq!(
            serde_json::to_value(DateRange::Year).unwrap(),
            serde_json::json!("1y")
        );
    }

    #[test]
    fn test_report_over_fixtures() {
        let report = fixture_report(DateRange::Month, date(2024, 12, 1));
        assert_eq!(
            report.metrics,
            ReportMetrics {
                total_contacts: 3,
                total_products: 3,
                total_subscriptions: 2,
                active_subscriptions: 2,
            }
        );
        assert_eq!(report.source_breakdown.len(), 5);
        assert_eq!(report.source_breakdown[0], Breakdown { name: "Organic".into(), value: 1 });
        assert_eq!(report.subscription_breakdown[0].value, 1);
        assert_eq!(report.subscription_breakdown[1].value, 1);
        assert_eq!(report.subscription_breakdown[2].value, 0);

        // Only pur_1 (2024-11-15) falls inside the last 30 days.
        let top = &report.product_performance[0];
        assert_eq!(top.sales, 1);
        assert_eq!(top.revenue, 199.0);
        assert_eq!(report.product_performance.iter().map(|p| p.sales).sum::<usize>(), 1);

        let year = fixture_report(DateRange::Year, date(2024, 12, 1));
        assert_eq!(year.product_performance.iter().map(|p| p.sales).sum::<usize>(), 2);
    }

    #[test]
    fn test_write_report_names_file_by_range_and_day() {
        let dir = tempfile::tempdir().unwrap();
        let report = fixture_report(DateRange::Week, date(2024, 12, 21));
        let path = write_report(&report, dir.path().join("exports")).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "veteducation-report-7d-2024-12-21.json"
        );
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["dateRange"], "7d");
        assert_eq!(written["metrics"]["totalContacts"], 3);
        assert_eq!(written["subscriptionBreakdown"][3]["name"], "Expired");
    }
}
