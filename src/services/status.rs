//! Order status classification
//!
//! Status transitions are free-form (operators may move an order to any
//! state), so classification only looks at the current status and due date.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{OrderStatus, ServiceOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusClassification {
    pub status: OrderStatus,
    pub overdue: bool,
}

/// Past its due date and not yet done
pub fn is_overdue(order: &ServiceOrder, now: DateTime<Utc>) -> bool {
    order.status != OrderStatus::Done && order.due_date.is_some_and(|due| due < now)
}

/// Bikes on this order are currently being worked on
pub fn is_in_maintenance(order: &ServiceOrder) -> bool {
    matches!(order.status, OrderStatus::Pending | OrderStatus::InProgress)
}

pub fn classify_status(order: &ServiceOrder, now: DateTime<Utc>) -> StatusClassification {
    StatusClassification {
        status: order.status,
        overdue: is_overdue(order, now),
    }
}

/// Status tallies over a set of orders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub by_status: BTreeMap<OrderStatus, u64>,
    pub overdue: u64,
    /// Counted per bike, not per order
    pub bikes_in_maintenance: u64,
}

/// Count orders per status. Every status is present, zero when unused.
pub fn count_statuses<'a, I>(orders: I, now: DateTime<Utc>) -> StatusCounts
where
    I: IntoIterator<Item = &'a ServiceOrder>,
{
    let mut counts = StatusCounts {
        by_status: OrderStatus::ALL.iter().map(|s| (*s, 0)).collect(),
        ..Default::default()
    };

    for order in orders {
        let classification = classify_status(order, now);
        *counts.by_status.entry(classification.status).or_default() += 1;
        if classification.overdue {
            counts.overdue += 1;
        }
        if is_in_maintenance(order) {
            counts.bikes_in_maintenance += order.bikes.len() as u64;
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BikeEntry, Client};
    use chrono::{Duration, TimeZone};

    fn order(status: OrderStatus, due: Option<DateTime<Utc>>, bikes: usize) -> ServiceOrder {
        ServiceOrder {
            id: "o".into(),
            code: String::new(),
            client: Client::default(),
            status,
            created_at: None,
            updated_at: None,
            completed_at: None,
            scheduled_at: None,
            due_date: due,
            observations: String::new(),
            mechanic_id: None,
            bikes: vec![BikeEntry::default(); bikes],
            declared_total: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_in_progress_past_due_is_overdue() {
        let yesterday = now() - Duration::days(1);
        let o = order(OrderStatus::InProgress, Some(yesterday), 1);
        let c = classify_status(&o, now());
        assert_eq!(c.status, OrderStatus::InProgress);
        assert!(c.overdue);
    }

    #[test]
    fn test_done_is_never_overdue() {
        let yesterday = now() - Duration::days(1);
        let o = order(OrderStatus::Done, Some(yesterday), 1);
        assert!(!classify_status(&o, now()).overdue);
    }

    #[test]
    fn test_no_due_date_is_not_overdue() {
        let o = order(OrderStatus::Pending, None, 1);
        assert!(!is_overdue(&o, now()));
    }

    #[test]
    fn test_future_due_date_is_not_overdue() {
        let o = order(OrderStatus::Pending, Some(now() + Duration::hours(1)), 1);
        assert!(!is_overdue(&o, now()));
    }

    #[test]
    fn test_due_exactly_now_is_not_overdue() {
        let o = order(OrderStatus::Pending, Some(now()), 1);
        assert!(!is_overdue(&o, now()));
    }

    #[test]
    fn test_in_maintenance() {
        assert!(is_in_maintenance(&order(OrderStatus::Pending, None, 1)));
        assert!(is_in_maintenance(&order(OrderStatus::InProgress, None, 1)));
        assert!(!is_in_maintenance(&order(OrderStatus::Done, None, 1)));
    }

    #[test]
    fn test_count_statuses() {
        let past = now() - Duration::days(2);
        let orders = vec![
            order(OrderStatus::Pending, Some(past), 2),
            order(OrderStatus::InProgress, None, 3),
            order(OrderStatus::Done, Some(past), 4),
            order(OrderStatus::Done, None, 1),
        ];

        let counts = count_statuses(&orders, now());

        assert_eq!(counts.by_status[&OrderStatus::Pending], 1);
        assert_eq!(counts.by_status[&OrderStatus::InProgress], 1);
        assert_eq!(counts.by_status[&OrderStatus::Done], 2);
        assert_eq!(counts.overdue, 1);
        // 2 + 3 bikes on open orders
        assert_eq!(counts.bikes_in_maintenance, 5);
    }

    #[test]
    fn test_count_statuses_empty_has_all_keys() {
        let none: Vec<ServiceOrder> = Vec::new();
        let counts = count_statuses(&none, now());
        assert_eq!(counts.by_status.len(), 3);
        assert!(counts.by_status.values().all(|v| *v == 0));
    }
}
