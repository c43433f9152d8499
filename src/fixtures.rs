//! Bundled seed data for a fresh store.

use crate::models::*;
use crate::settings::Settings;
use crate::timestamp::date;

pub fn contacts() -> Vec<Contact> {
    vec![
        Contact {
            id: "1".into(),
            first_name: "Sarah".into(),
            last_name: "Johnson".into(),
            email: "sarah.johnson@vetclinic.com".into(),
            phone: Some("+61 400 123 456".into()),
            job_title: Some("Veterinary Nurse".into()),
            company: Some("Melbourne Vet Clinic".into()),
            tags: normalize_tags(["VN", "CARDIOLOGY_2025", "ACTIVE_SUBSCRIBER"]),
            source: Source::Organic,
            created_at: date(2023, 1, 15),
            last_activity: date(2024, 12, 20),
            engagement_score: 85,
            subscription_ids: vec!["sub_1".into()],
            purchase_ids: vec!["pur_1".into()],
        },
        Contact {
            id: "2".into(),
            first_name: "Dr. Michael".into(),
            last_name: "Chen".into(),
            email: "michael.chen@animalcare.com.au".into(),
            phone: Some("+61 400 234 567".into()),
            job_title: Some("Veterinarian".into()),
            company: Some("Animal Care Hospital".into()),
            tags: normalize_tags(["VET", "PRACTICE_ADMIN", "PREMIUM_SUBSCRIBER"]),
            source: Source::Referral,
            created_at: date(2022, 8, 20),
            last_activity: date(2024, 12, 21),
            engagement_score: 92,
            subscription_ids: vec!["sub_2".into()],
            purchase_ids: vec!["pur_2".into()],
        },
        Contact {
            id: "3".into(),
            first_name: "Emma".into(),
            last_name: "Wilson".into(),
            email: "emma.wilson@petcare.net".into(),
            phone: Some("+61 400 345 678".into()),
            job_title: Some("Practice Manager".into()),
            company: Some("Sydney Pet Care".into()),
            tags: normalize_tags(["MANAGER", "WEBINAR_MEMBER", "HIGH_ENGAGEMENT"]),
            source: Source::Social,
            created_at: date(2023, 5, 10),
            last_activity: date(2024, 12, 19),
            engagement_score: 78,
            subscription_ids: vec![],
            purchase_ids: vec![],
        },
    ]
}

pub fn subscriptions() -> Vec<Subscription> {
    vec![
        Subscription {
            id: "sub_1".into(),
            contact_id: "1".into(),
            plan: PlanType::Individual,
            status: SubscriptionStatus::Active,
            start_date: date(2024, 1, 1),
            renewal_date: date(2025, 1, 1),
            amount: 299.0,
            currency: DEFAULT_CURRENCY.into(),
            payment_method: DEFAULT_PAYMENT_METHOD.into(),
            parent_subscription_id: None,
            team_members: vec![],
            max_team_members: 1,
        },
        Subscription {
            id: "sub_2".into(),
            contact_id: "2".into(),
            plan: PlanType::Practice,
            status: SubscriptionStatus::Active,
            start_date: date(2024, 3, 15),
            renewal_date: date(2025, 3, 15),
            amount: 899.0,
            currency: DEFAULT_CURRENCY.into(),
            payment_method: DEFAULT_PAYMENT_METHOD.into(),
            parent_subscription_id: None,
            team_members: vec![],
            max_team_members: DEFAULT_PRACTICE_SEATS,
        },
    ]
}

pub fn products() -> Vec<Product> {
    vec![
        Product {
            id: "prod_1".into(),
            name: "Small Animal Cardiology for Veterinary Nurses".into(),
            product_type: ProductType::Course,
            price: 199.0,
            currency: DEFAULT_CURRENCY.into(),
            description: "Comprehensive cardiology course for veterinary nurses".into(),
            tags: normalize_tags(["CARDIOLOGY", "VN", "CPD"]),
            is_active: true,
            created_at: date(2024, 1, 1),
        },
        Product {
            id: "prod_2".into(),
            name: "Individual Webinar Membership".into(),
            product_type: ProductType::Subscription,
            price: 299.0,
            currency: DEFAULT_CURRENCY.into(),
            description: "Monthly webinar access for individuals".into(),
            tags: normalize_tags(["WEBINAR", "INDIVIDUAL", "SUBSCRIPTION"]),
            is_active: true,
            created_at: date(2024, 1, 1),
        },
        Product {
            id: "prod_3".into(),
            name: "Practice Webinar Membership".into(),
            product_type: ProductType::Subscription,
            price: 899.0,
            currency: DEFAULT_CURRENCY.into(),
            description: "Monthly webinar access for practice teams (up to 5 members)".into(),
            tags: normalize_tags(["WEBINAR", "PRACTICE", "SUBSCRIPTION"]),
            is_active: true,
            created_at: date(2024, 1, 1),
        },
    ]
}

pub fn purchases() -> Vec<Purchase> {
    vec![
        Purchase {
            id: "pur_1".into(),
            contact_id: "1".into(),
            product_id: "prod_1".into(),
            product_name: "Small Animal Cardiology for Veterinary Nurses".into(),
            amount: 199.0,
            currency: DEFAULT_CURRENCY.into(),
            purchase_date: date(2024, 11, 15),
            status: PurchaseStatus::Completed,
            tags: vec!["CARDIOLOGY_2025".into()],
        },
        Purchase {
            id: "pur_2".into(),
            contact_id: "2".into(),
            product_id: "prod_3".into(),
            product_name: "Practice Webinar Membership".into(),
            amount: 899.0,
            currency: DEFAULT_CURRENCY.into(),
            purchase_date: date(2024, 3, 15),
            status: PurchaseStatus::Completed,
            tags: vec!["PRACTICE_SUBSCRIPTION".into()],
        },
    ]
}

pub fn campaigns() -> Vec<EmailCampaign> {
    vec![
        EmailCampaign {
            id: "camp_1".into(),
            name: "Welcome Series - New Subscribers".into(),
            subject: "Welcome to VetEducation!".into(),
            content: "Welcome email content...".into(),
            campaign_type: CampaignType::Automation,
            status: CampaignStatus::Sent,
            scheduled_at: None,
            sent_at: Some(date(2024, 12, 20)),
            recipients: vec!["1".into(), "2".into(), "3".into()],
            segment_criteria: None,
            metrics: EmailMetrics::from_counts(DeliveryCounts {
                sent: 150,
                delivered: 148,
                opened: 89,
                clicked: 23,
                unsubscribed: 2,
                bounced: 2,
            }),
        },
        EmailCampaign {
            id: "camp_2".into(),
            name: "Monthly Newsletter - December".into(),
            subject: "Your December CPD Update".into(),
            content: "Newsletter content...".into(),
            campaign_type: CampaignType::Broadcast,
            status: CampaignStatus::Sent,
            scheduled_at: None,
            sent_at: Some(date(2024, 12, 1)),
            recipients: vec!["1".into(), "2".into(), "3".into()],
            segment_criteria: None,
            metrics: EmailMetrics::from_counts(DeliveryCounts {
                sent: 2500,
                delivered: 2485,
                opened: 1242,
                clicked: 186,
                unsubscribed: 8,
                bounced: 15,
            }),
        },
    ]
}

pub fn settings() -> Settings {
    Settings::default()
}
