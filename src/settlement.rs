//! Payment routing and session verification for item purchases.
//!
//! Nothing here touches the database or the network; the purchase service
//! decides what to do from these results and performs the side effects.

use chrono::{DateTime, Duration, Utc};

use crate::{clients::payment::SessionStatus, error::AppError};

/// Days a buyer has to send a manual payment before the order lapses.
pub const MANUAL_PAYMENT_GRACE_DAYS: i64 = 3;

/// Marker stored in `orders.session_id` for point-only purchases.
pub const POINTS_SESSION: &str = "points";

/// The fields of an item that decide how it can be paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTerms {
    pub price: i64,
    pub accepts_points: bool,
    pub processor_opt_out: bool,
}

impl From<&crate::entity::items::Model> for ItemTerms {
    fn from(item: &crate::entity::items::Model) -> Self {
        Self {
            price: item.price,
            accepts_points: item.accepts_points,
            processor_opt_out: item.processor_opt_out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRoute {
    /// Card payment through a checkout session for `charge`; `reserved_points`
    /// are deducted from the buyer when the session comes back paid.
    Processor { charge: i64, reserved_points: i64 },
    /// The whole price is paid from the buyer's balance.
    Points,
    /// The seller collects payment outside the platform.
    ManualTransfer,
}

impl PaymentRoute {
    pub fn reserved_points(&self, price: i64) -> i64 {
        match self {
            PaymentRoute::Processor {
                reserved_points, ..
            } => *reserved_points,
            PaymentRoute::Points => price,
            PaymentRoute::ManualTransfer => 0,
        }
    }
}

/// Route for a plain checkout, without touching the point balance.
pub fn route_checkout(item: ItemTerms) -> PaymentRoute {
    if item.processor_opt_out {
        PaymentRoute::ManualTransfer
    } else {
        PaymentRoute::Processor {
            charge: item.price,
            reserved_points: 0,
        }
    }
}

/// Route for a purchase that spends the buyer's balance first.
pub fn route_point_purchase(item: ItemTerms, balance: i64) -> Result<PaymentRoute, AppError> {
    if !item.accepts_points {
        return Err(AppError::PointsNotAccepted);
    }
    let balance = balance.max(0);
    if balance >= item.price {
        return Ok(PaymentRoute::Points);
    }
    if item.processor_opt_out {
        return Err(AppError::InsufficientPoints);
    }
    Ok(PaymentRoute::Processor {
        charge: item.price - balance,
        reserved_points: balance,
    })
}

/// Route for the callback leg, reconstructed from what the success URL
/// carried back. `reserved_points` must leave a positive charge.
pub fn route_callback(item: ItemTerms, reserved_points: i64) -> Result<PaymentRoute, AppError> {
    if item.processor_opt_out {
        return Ok(PaymentRoute::ManualTransfer);
    }
    if reserved_points < 0 || reserved_points >= item.price {
        return Err(AppError::BadRequest("invalid point reservation".into()));
    }
    if reserved_points > 0 && !item.accepts_points {
        return Err(AppError::PointsNotAccepted);
    }
    Ok(PaymentRoute::Processor {
        charge: item.price - reserved_points,
        reserved_points,
    })
}

/// Accepts a checkout session only when it is paid in full for this item.
pub fn verify_session(
    status: &SessionStatus,
    expected_amount: i64,
    reference: &str,
) -> Result<(), AppError> {
    let paid = status.payment_status == "paid";
    let has_intent = status
        .payment_intent
        .as_deref()
        .is_some_and(|intent| intent.starts_with("pi_"));
    let same_reference = status.client_reference_id.as_deref() == Some(reference);
    let same_amount = status.amount_total == Some(expected_amount);

    if paid && has_intent && same_reference && same_amount {
        Ok(())
    } else {
        tracing::warn!(
            session_id = %status.id,
            payment_status = %status.payment_status,
            amount_total = ?status.amount_total,
            expected_amount,
            "checkout session rejected"
        );
        Err(AppError::PaymentNotCompleted)
    }
}

pub fn manual_payment_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(MANUAL_PAYMENT_GRACE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(price: i64, accepts_points: bool, processor_opt_out: bool) -> ItemTerms {
        ItemTerms {
            price,
            accepts_points,
            processor_opt_out,
        }
    }

    fn paid_session(amount: i64, reference: &str) -> SessionStatus {
        SessionStatus {
            id: "cs_test".into(),
            payment_status: "paid".into(),
            payment_intent: Some("pi_123".into()),
            amount_total: Some(amount),
            client_reference_id: Some(reference.into()),
        }
    }

    #[test]
    fn balance_covering_price_pays_with_points_only() {
        let route = route_point_purchase(terms(1000, true, false), 1500).unwrap();
        assert_eq!(route, PaymentRoute::Points);
        assert_eq!(route.reserved_points(1000), 1000);
    }

    #[test]
    fn shortfall_is_charged_to_the_card() {
        let route = route_point_purchase(terms(1000, true, false), 300).unwrap();
        assert_eq!(
            route,
            PaymentRoute::Processor {
                charge: 700,
                reserved_points: 300
            }
        );
    }

    #[test]
    fn shortfall_without_card_option_is_rejected() {
        let err = route_point_purchase(terms(1000, true, true), 999).unwrap_err();
        assert!(matches!(err, AppError::InsufficientPoints));
    }

    #[test]
    fn items_refusing_points_reject_point_purchases() {
        let err = route_point_purchase(terms(1000, false, false), 5000).unwrap_err();
        assert!(matches!(err, AppError::PointsNotAccepted));
    }

    #[test]
    fn opted_out_items_settle_manually() {
        assert_eq!(
            route_checkout(terms(800, false, true)),
            PaymentRoute::ManualTransfer
        );
        assert_eq!(
            route_checkout(terms(800, false, false)),
            PaymentRoute::Processor {
                charge: 800,
                reserved_points: 0
            }
        );
    }

    #[test]
    fn callback_reservation_must_leave_a_charge() {
        assert!(route_callback(terms(1000, true, false), 1000).is_err());
        assert!(route_callback(terms(1000, true, false), -1).is_err());
        assert!(matches!(
            route_callback(terms(1000, false, false), 10),
            Err(AppError::PointsNotAccepted)
        ));
        assert_eq!(
            route_callback(terms(1000, true, false), 400).unwrap(),
            PaymentRoute::Processor {
                charge: 600,
                reserved_points: 400
            }
        );
    }

    #[test]
    fn session_must_match_amount_and_reference() {
        assert!(verify_session(&paid_session(700, "item"), 700, "item").is_ok());
        assert!(verify_session(&paid_session(1000, "item"), 700, "item").is_err());
        assert!(verify_session(&paid_session(700, "other"), 700, "item").is_err());

        let mut unpaid = paid_session(700, "item");
        unpaid.payment_status = "unpaid".into();
        assert!(verify_session(&unpaid, 700, "item").is_err());

        let mut no_intent = paid_session(700, "item");
        no_intent.payment_intent = Some("seti_1".into());
        assert!(verify_session(&no_intent, 700, "item").is_err());
    }

    #[test]
    fn manual_deadline_is_three_days_out() {
        let now = Utc::now();
        assert_eq!(manual_payment_deadline(now) - now, Duration::days(3));
    }
}
