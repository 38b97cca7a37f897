//! # Validation Module
//!
//! Checks applied to merchant settings before they are saved and to
//! identifiers before they are sent upstream.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  settings form / config file                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  THIS MODULE: required keys, URL shape, ratio numerics                  │
//! │           │  (failures become admin notices, the value is still kept)   │
//! │           ▼                                                             │
//! │  LoyaltyApi: email vs numeric id dispatch via `is_email`                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use loyaltydog_core::validation::{is_email, validate_points_ratio};
//!
//! assert!(is_email("jane@example.com"));
//! assert_eq!(validate_points_ratio("2", "1").unwrap(), "2:1");
//! ```

use url::Url;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifiers
// =============================================================================

/// Loose email shape check used to tell emails from numeric ids.
///
/// ## Rules
/// - exactly one `@` with a non-empty local part
/// - domain has at least one dot and no empty labels
/// - no whitespace
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.len() < 6 || value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Normalises an email for lookups and cache keys.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Settings
// =============================================================================

/// Validates a required setting.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates the API base URL.
///
/// ## Rules
/// - required
/// - absolute `http` or `https` URL with a host
pub fn validate_api_url(value: &str) -> ValidationResult<Url> {
    validate_required("api_url", value)?;

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "api_url".to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(value.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Validates the two halves of the earn ratio and joins them as `P:M`.
///
/// Both halves must be non-zero numbers, as entered in the settings form.
pub fn validate_points_ratio(points: &str, monetary_value: &str) -> ValidationResult<String> {
    let points = points.trim();
    let monetary_value = monetary_value.trim();

    for (field, value) in [("points", points), ("monetary_value", monetary_value)] {
        validate_required(field, value)?;
        let number: f64 = value.parse().map_err(|_| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be numeric".to_string(),
        })?;
        if !number.is_finite() || number <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: field.to_string(),
            });
        }
    }

    Ok(format!("{points}:{monetary_value}"))
}

/// Parses a points setting (`account_signup_points`, `write_review_points`).
///
/// Empty means "not configured" and yields 0.
pub fn parse_points_setting(field: &str, value: &str) -> ValidationResult<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    let points: i64 = value.parse().map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a whole number".to_string(),
    })?;
    if points < 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_email() {
        assert!(is_email("jane@example.com"));
        assert!(is_email("Jane.Doe+loyalty@shop.example.co.uk"));
        assert!(!is_email("12345"));
        assert!(!is_email("jane@localhost"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("jane@@example.com"));
        assert!(!is_email("jane doe@example.com"));
        assert!(!is_email("jane@example..com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn test_validate_api_url() {
        assert!(validate_api_url("https://app.loyalty.dog/api/v1").is_ok());
        assert!(matches!(
            validate_api_url(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_api_url("not a url"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(validate_api_url("ftp://app.loyalty.dog").is_err());
    }

    #[test]
    fn test_validate_points_ratio() {
        assert_eq!(validate_points_ratio(" 1 ", "2.5").unwrap(), "1:2.5");
        assert!(matches!(
            validate_points_ratio("", "1"),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_points_ratio("one", "1"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_points_ratio("1", "0"),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_parse_points_setting() {
        assert_eq!(parse_points_setting("write_review_points", "").unwrap(), 0);
        assert_eq!(parse_points_setting("write_review_points", " 25 ").unwrap(), 25);
        assert!(parse_points_setting("write_review_points", "-5").is_err());
        assert!(parse_points_setting("write_review_points", "lots").is_err());
    }
}
