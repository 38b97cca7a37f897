//! # Admin Notices
//!
//! One-time messages for the shop operator and the settings checks that
//! produce them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sanitize_settings / send_push_notification                             │
//! │        │ add_error / add_message                                        │
//! │        ▼                                                                │
//! │  AdminNotices ──drain()──► errors if any, otherwise messages            │
//! │                            (both lists are emptied)                     │
//! │                                                                         │
//! │  check_settings / check_coupons   standing warnings, never stored       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use loyaltydog_core::points::{PointsRatio, RoundingMode};
use loyaltydog_core::validation::{parse_points_setting, validate_api_url, validate_points_ratio};

use crate::api::LoyaltyApi;
use crate::config::{ApiSettings, EarnWhen, LoyaltyConfig};

pub const SETUP_NOTICE: &str =
    "<strong>LoyaltyDog</strong> is almost ready. To get started, set your LoyaltyDog account keys.";

pub const COUPONS_DISABLED_NOTICE: &str = "<strong>LoyaltyDog</strong> requires coupons to be enabled in order to function properly and allow customers to redeem offer during checkout.";

pub const BLANK_MESSAGE_ERROR: &str = "Message can not be blank.";

pub const MESSAGE_SENT: &str = "Message have been sent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Error,
    Message,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn warning(text: &str) -> Self {
        Notice {
            kind: NoticeKind::Warning,
            text: text.to_string(),
        }
    }

    /// Notice text with inline markup removed, for terminals and logs.
    pub fn plain_text(&self) -> String {
        let mut text = String::with_capacity(self.text.len());
        let mut in_tag = false;
        for c in self.text.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => text.push(c),
                _ => {}
            }
        }
        text
    }
}

// =============================================================================
// Notice Store
// =============================================================================

#[derive(Debug, Default)]
struct Pending {
    errors: Vec<String>,
    messages: Vec<String>,
}

/// Notices collected while handling one admin action.
#[derive(Debug, Default)]
pub struct AdminNotices {
    pending: Mutex<Pending>,
}

impl AdminNotices {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_error(&self, text: impl Into<String>) {
        let text = text.into();
        warn!(notice = %text, "Admin error notice");
        self.lock().errors.push(text);
    }

    pub fn add_message(&self, text: impl Into<String>) {
        self.lock().messages.push(text.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.lock().errors.is_empty()
    }

    /// Takes the notices to display. Errors hide messages.
    pub fn drain(&self) -> Vec<Notice> {
        let mut pending = self.lock();
        let errors = std::mem::take(&mut pending.errors);
        let messages = std::mem::take(&mut pending.messages);

        if !errors.is_empty() {
            errors
                .into_iter()
                .map(|text| Notice {
                    kind: NoticeKind::Error,
                    text,
                })
                .collect()
        } else {
            messages
                .into_iter()
                .map(|text| Notice {
                    kind: NoticeKind::Message,
                    text,
                })
                .collect()
        }
    }
}

// =============================================================================
// Standing Checks
// =============================================================================

/// Setup warning while the account keys are missing.
pub fn check_settings(api: &ApiSettings) -> Option<Notice> {
    let missing = api.url.trim().is_empty()
        || api.program_id.trim().is_empty()
        || api.api_key.trim().is_empty();
    missing.then(|| Notice::warning(SETUP_NOTICE))
}

/// Warning when the shop has coupons switched off.
pub fn check_coupons(coupons_enabled: bool) -> Option<Notice> {
    (!coupons_enabled).then(|| Notice::warning(COUPONS_DISABLED_NOTICE))
}

// =============================================================================
// Settings Form
// =============================================================================

/// Raw values submitted from the settings screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsForm {
    pub api_url: String,
    pub program_id: String,
    pub api_key: String,
    pub debug: bool,
    pub earn_when: String,
    pub ratio_points: String,
    pub ratio_monetary_value: String,
    pub rounding: String,
    pub available_offer_message: String,
    pub redeem_offer_message: String,
    pub account_signup_points: String,
    pub write_review_points: String,
}

/// Applies `form` on top of `current`, reporting problems as error notices.
///
/// Connection values are stored even when invalid so the operator can fix
/// them in place; an invalid ratio or points value keeps the previous one.
pub fn sanitize_settings(form: &SettingsForm, current: &LoyaltyConfig, notices: &AdminNotices) -> LoyaltyConfig {
    let mut config = current.clone();

    let api_url = form.api_url.trim();
    if api_url.is_empty() {
        notices.add_error("API URL is required.");
    } else if validate_api_url(api_url).is_err() {
        notices.add_error(format!("{api_url} is not a valid url."));
    }
    config.api.url = api_url.to_string();

    for (title, value) in [("Program ID", &form.program_id), ("API Key", &form.api_key)] {
        if value.trim().is_empty() {
            notices.add_error(format!("{title} is required."));
        }
    }
    config.api.program_id = form.program_id.trim().to_string();
    config.api.api_key = form.api_key.trim().to_string();
    config.api.debug = form.debug;

    if !form.earn_when.trim().is_empty() {
        match form.earn_when.parse::<EarnWhen>() {
            Ok(when) => config.points.earn_when = when,
            Err(_) => notices.add_error("Earn Points When Order Status Is is invalid."),
        }
    }

    if !form.ratio_monetary_value.trim().is_empty() {
        match validate_points_ratio(&form.ratio_points, &form.ratio_monetary_value)
            .ok()
            .filter(|ratio| PointsRatio::parse(ratio).is_ok())
        {
            Some(ratio) => config.points.ratio = ratio,
            None => notices.add_error("Earn Points Conversion Rate is invalid."),
        }
    }

    config.points.rounding = RoundingMode::from_setting(&form.rounding);
    config.messages.available_offer = form.available_offer_message.clone();
    config.messages.redeem_offer = form.redeem_offer_message.clone();

    for (title, raw, target) in [
        (
            "Points earned for account signup",
            &form.account_signup_points,
            &mut config.points.account_signup_points,
        ),
        (
            "Points earned for writing a review",
            &form.write_review_points,
            &mut config.points.write_review_points,
        ),
    ] {
        match parse_points_setting(title, raw) {
            Ok(points) => *target = points,
            Err(_) => notices.add_error(format!("{title} is invalid.")),
        }
    }

    config
}

// =============================================================================
// Push Notification Action
// =============================================================================

/// Broadcasts `message` and records the outcome as a notice.
pub async fn send_push_notification(api: &LoyaltyApi, message: &str, notices: &AdminNotices) -> bool {
    if message.trim().is_empty() {
        notices.add_error(BLANK_MESSAGE_ERROR);
        return false;
    }

    let sent = api.push_notifications(message).await;
    if sent {
        info!(program_id = %api.program_id(), "Push notification sent");
        notices.add_message(MESSAGE_SENT);
    }
    sent
}
