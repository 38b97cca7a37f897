//! # loyaltydog-core: Pure Business Logic for the LoyaltyDog Integration
//!
//! This crate holds every rule of the loyalty integration that can be
//! expressed without touching the network: how points are earned, how an
//! upstream offer card becomes a cart discount, and how redemption codes
//! and customer-facing messages are derived.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     LoyaltyDog Integration                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Host e-commerce platform (orders, cart)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ lifecycle events                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         loyaltydog-client (API client, cache, adapters)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ loyaltydog-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  points   │  │ discount  │  │  message  │  │   │
//! │  │   │ Customer  │  │  Ratio    │  │   Code    │  │ templates │  │   │
//! │  │   │ Offer     │  │ Rounding  │  │  Coupon   │  │ friendly  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO HTTP • NO CACHE • PURE FUNCTIONS                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Upstream records (Customer, Offer, Card)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`points`] - Purchase-to-points conversion
//! - [`discount`] - Discount amounts and redemption codes
//! - [`message`] - Offer message templating
//! - [`validation`] - Settings validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use loyaltydog_core::money::Money;
//! use loyaltydog_core::points::{PointsCalculator, RoundingMode};
//!
//! let calculator = PointsCalculator::new("1:1", RoundingMode::Round);
//! let points = calculator.calculate_points(Money::from_cents(1000));
//! assert_eq!(points, 10);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod message;
pub mod money;
pub mod points;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default upstream API base URL.
pub const DEFAULT_API_URL: &str = "https://app.loyalty.dog/api/v1";

/// How long a customer record stays cached (seconds).
pub const CUSTOMER_DETAILS_CACHE_SECS: u64 = 30;

/// How long a decoded offer stays cached (seconds).
pub const OFFER_DETAILS_CACHE_SECS: u64 = 3600;
