//! Typed settings singleton.
//!
//! One concrete struct per section. Edits replace a whole section through
//! [`SettingsPatch`], so a caller can never write a field into the wrong
//! section.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::storage::Storage;

pub const SETTINGS_KEY: &str = "settings";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    pub name: String,
    pub website: String,
    pub support_email: String,
    pub timezone: String,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            name: "VetEducation".into(),
            website: "https://veteducation.com".into(),
            support_email: "support@veteducation.com".into(),
            timezone: "Australia/Sydney".into(),
        }
    }
}

/// Outbound mail transport. Stored only; nothing in this crate sends mail.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub smtp_server: String,
    pub port: u16,
    pub encryption: String,
    pub username: String,
    pub password: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_server: String::new(),
            port: 587,
            encryption: "TLS".into(),
            username: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    pub eway_api_key: String,
    pub eway_customer_id: String,
    pub stripe_connected: bool,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            eway_api_key: "••••••••••••••••".into(),
            eway_customer_id: "87654321".into(),
            stripe_connected: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub two_factor_enabled: bool,
    pub session_timeout: String,
    pub ip_restrictions_enabled: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            two_factor_enabled: true,
            session_timeout: "30 minutes".into(),
            ip_restrictions_enabled: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub new_subscriptions: bool,
    pub payment_failures: bool,
    pub weekly_reports: bool,
    pub system_updates: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            new_subscriptions: true,
            payment_failures: true,
            weekly_reports: true,
            system_updates: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub company: CompanySettings,
    pub email: EmailSettings,
    pub payments: PaymentSettings,
    pub security: SecuritySettings,
    pub notifications: NotificationSettings,
}

/// Replacement for exactly one settings section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "section", content = "values", rename_all = "lowercase")]
pub enum SettingsPatch {
    Company(CompanySettings),
    Email(EmailSettings),
    Payments(PaymentSettings),
    Security(SecuritySettings),
    Notifications(NotificationSettings),
}

impl SettingsPatch {
    pub fn section(&self) -> &'static str {
        match self {
            SettingsPatch::Company(_) => "company",
            SettingsPatch::Email(_) => "email",
            SettingsPatch::Payments(_) => "payments",
            SettingsPatch::Security(_) => "security",
            SettingsPatch::Notifications(_) => "notifications",
        }
    }

    fn apply(self, settings: &mut Settings) {
        match self {
            SettingsPatch::Company(v) => settings.company = v,
            SettingsPatch::Email(v) => settings.email = v,
            SettingsPatch::Payments(v) => settings.payments = v,
            SettingsPatch::Security(v) => settings.security = v,
            SettingsPatch::Notifications(v) => settings.notifications = v,
        }
    }
}

#[derive(Clone)]
pub struct SettingsService {
    storage: Storage,
    seed: fn() -> Settings,
}

impl SettingsService {
    pub fn new(storage: Storage, seed: fn() -> Settings) -> Self {
        Self { storage, seed }
    }

    pub fn get(&self) -> Result<Settings> {
        self.storage.read(SETTINGS_KEY, self.seed)
    }

    pub fn update(&self, patch: SettingsPatch) -> Result<Settings> {
        let section = patch.section();
        let updated = self
            .storage
            .mutate(SETTINGS_KEY, self.seed, |settings: &mut Settings| {
                patch.apply(settings);
                Ok(Some(settings.clone()))
            })?;
        info!(section, "settings section saved");
        match updated {
            Some(settings) => Ok(settings),
            None => self.get(),
        }
    }

    pub fn connect_stripe(&self) -> Result<Settings> {
        let updated = self
            .storage
            .mutate(SETTINGS_KEY, self.seed, |settings: &mut Settings| {
                if settings.payments.stripe_connected {
                    return Ok(None);
                }
                settings.payments.stripe_connected = true;
                Ok(Some(settings.clone()))
            })?;
        match updated {
            Some(settings) => {
                info!("stripe connected");
                Ok(settings)
            }
            None => self.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_seeded_and_sections_replaced() {
        let service = SettingsService::new(Storage::memory(), Settings::default);
        let settings = service.get().unwrap();
        assert_eq!(settings.company.name, "VetEducation");
        assert_eq!(settings.email.port, 587);

        let updated = service
            .update(SettingsPatch::Email(EmailSettings {
                smtp_server: "smtp.example.com".into(),
                ..EmailSettings::default()
            }))
            .unwrap();
        assert_eq!(updated.email.smtp_server, "smtp.example.com");
        assert_eq!(updated.company, CompanySettings::default());
    }

    #[test]
    fn test_connect_stripe_is_idempotent() {
        let service = SettingsService::new(Storage::memory(), Settings::default);
        assert!(service.connect_stripe().unwrap().payments.stripe_connected);
        assert!(service.connect_stripe().unwrap().payments.stripe_connected);
    }

    #[test]
    fn test_patch_wire_format() {
        let patch: SettingsPatch = serde_json::from_value(serde_json::json!({
            "section": "notifications",
            "values": {
                "newSubscriptions": false,
                "paymentFailures": true,
                "weeklyReports": false,
                "systemUpdates": true
            }
        }))
        .unwrap();
        assert_eq!(patch.section(), "notifications");
    }
}
