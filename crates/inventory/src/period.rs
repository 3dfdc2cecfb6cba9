//! Period segmentation.
//!
//! Walks a ledger from the newest entry to the oldest and cuts it into periods
//! bounded by consecutive stock-on-hand observations. Each period is either
//! accepted (and possibly prorated against the lookback window) or excluded
//! with a reason. Aggregation lives in [`Segmentation::summarize`], separate from
//! the walk, so segmentation can be inspected on its own.

use core::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use stockwise_core::error::ensure_positive;
use stockwise_core::{DomainResult, ValueObject};

use crate::transaction::{Transaction, TransactionKind};

/// What to do with a period whose later balance exceeds what the earlier balance
/// plus receipts can explain.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Drop the period from the aggregate.
    #[default]
    Exclude,
    /// Treat the shortfall as an unrecorded receipt. The period then counts with
    /// the consumption reported inside it.
    InferReceipts,
}

/// Why a period does not contribute to the estimate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    /// One of the bounding observations is a stockout.
    Stockout,
    /// More stock appeared than receipts explain.
    Anomalous,
    /// Bounding observations are out of chronological order.
    Chronology,
    /// The whole period lies at or beyond the lookback window.
    OutsideWindow,
}

/// Interval between two consecutive stock-on-hand observations.
///
/// `start_*` refers to the older observation, `end_*` to the newer one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start_age_days: f64,
    pub end_age_days: f64,
    pub start_balance: f64,
    pub end_balance: f64,
    pub receipts_within: f64,
    /// Receipts inferred to reconcile an anomalous period (zero otherwise).
    pub inferred_receipts: f64,
    /// Quantity consumed over the full, unprorated period.
    pub consumption: f64,
    pub duration_days: f64,
    /// Fraction of the period inside the lookback window, in `[0, 1]`.
    pub scaling_factor: f64,
    pub exclusion: Option<Exclusion>,
}

impl ValueObject for Period {}

impl Period {
    pub fn is_accepted(&self) -> bool {
        self.exclusion.is_none()
    }

    pub fn excluded(&self) -> bool {
        self.exclusion.is_some()
    }

    /// Days this period contributes to the estimate.
    pub fn in_window_days(&self) -> f64 {
        if self.excluded() {
            return 0.0;
        }
        self.scaling_factor * self.duration_days
    }

    /// Consumption this period contributes to the estimate.
    pub fn in_window_consumption(&self) -> f64 {
        if self.excluded() {
            return 0.0;
        }
        self.scaling_factor * self.consumption
    }
}

/// Aggregate over the accepted periods of a segmentation.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSummary {
    pub periods: usize,
    pub total_days: f64,
    pub total_consumption: f64,
}

/// Result of walking one ledger: every period met, accepted or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    /// Periods in walk order (newest first).
    pub periods: Vec<Period>,
}

impl Segmentation {
    pub fn accepted(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter().filter(|p| p.is_accepted())
    }

    pub fn excluded_by(&self, reason: Exclusion) -> usize {
        self.periods
            .iter()
            .filter(|p| p.exclusion == Some(reason))
            .count()
    }

    pub fn summarize(&self) -> ConsumptionSummary {
        self.accepted().fold(
            ConsumptionSummary {
                periods: 0,
                total_days: 0.0,
                total_consumption: 0.0,
            },
            |acc, p| ConsumptionSummary {
                periods: acc.periods + 1,
                total_days: acc.total_days + p.in_window_days(),
                total_consumption: acc.total_consumption + p.in_window_consumption(),
            },
        )
    }
}

/// Segment `transactions` into periods against a lookback window.
///
/// The ledger may be given oldest-first or newest-first; it is walked newest-first
/// either way. Entries sharing an age keep their list order, which decides the
/// period a same-instant receipt belongs to.
pub fn segment(
    transactions: &[Transaction],
    window_length_days: f64,
    policy: AnomalyPolicy,
) -> DomainResult<Segmentation> {
    ensure_positive("window_length_days", window_length_days)?;
    for t in transactions {
        t.validate()?;
    }

    let mut walk = Walk::new(window_length_days, policy);
    for t in newest_first(transactions) {
        if walk.step(t).is_break() {
            break;
        }
    }
    Ok(walk.finish())
}

/// Order entries newest-first.
///
/// A ledger whose first entry is younger than its last is taken as newest-first;
/// anything else is reversed.
fn newest_first(transactions: &[Transaction]) -> Vec<&Transaction> {
    let already_newest_first = match (transactions.first(), transactions.last()) {
        (Some(first), Some(last)) => first.age_in_days < last.age_in_days,
        _ => true,
    };
    if already_newest_first {
        transactions.iter().collect()
    } else {
        transactions.iter().rev().collect()
    }
}

/// The period being assembled: its newer edge plus what was seen since.
#[derive(Debug)]
struct OpenPeriod<'a> {
    end: &'a Transaction,
    receipts: f64,
    reported_consumption: f64,
}

impl<'a> OpenPeriod<'a> {
    fn at(end: &'a Transaction) -> Self {
        Self {
            end,
            receipts: 0.0,
            reported_consumption: 0.0,
        }
    }
}

#[derive(Debug)]
struct Walk<'a> {
    window_length_days: f64,
    policy: AnomalyPolicy,
    open: Option<OpenPeriod<'a>>,
    periods: Vec<Period>,
}

impl<'a> Walk<'a> {
    fn new(window_length_days: f64, policy: AnomalyPolicy) -> Self {
        Self {
            window_length_days,
            policy,
            open: None,
            periods: Vec::new(),
        }
    }

    fn step(&mut self, t: &'a Transaction) -> ControlFlow<()> {
        match t.kind {
            TransactionKind::StockOnHand | TransactionKind::Stockout if t.is_stockout() => {
                if let Some(open) = self.open.take() {
                    tracing::trace!(
                        stockout_age_days = t.age_in_days,
                        end_age_days = open.end.age_in_days,
                        "stockout voids period"
                    );
                    self.close(open, t);
                }
                // The stockout anchors nothing; the period behind it is voided too.
                self.open = Some(OpenPeriod::at(t));
            }
            TransactionKind::StockOnHand | TransactionKind::Stockout => {
                if let Some(open) = self.open.take() {
                    self.close(open, t);
                }
                if t.age_in_days > self.window_length_days {
                    return ControlFlow::Break(());
                }
                self.open = Some(OpenPeriod::at(t));
            }
            TransactionKind::Receipt => {
                if let Some(open) = self.open.as_mut() {
                    open.receipts += t.quantity;
                }
            }
            TransactionKind::Consumption => {
                if let Some(open) = self.open.as_mut() {
                    open.reported_consumption += t.quantity;
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Close `open` using `start` as the older edge.
    fn close(&mut self, open: OpenPeriod<'a>, start: &Transaction) {
        let end = open.end;
        let implied_end = start.quantity + open.receipts;
        let duration_days = start.age_in_days - end.age_in_days;

        let mut period = Period {
            start_age_days: start.age_in_days,
            end_age_days: end.age_in_days,
            start_balance: start.quantity,
            end_balance: end.quantity,
            receipts_within: open.receipts,
            inferred_receipts: 0.0,
            consumption: implied_end - end.quantity,
            duration_days,
            scaling_factor: self.scaling_factor(end.age_in_days, start.age_in_days, duration_days),
            exclusion: None,
        };

        period.exclusion = if start.is_stockout() || end.is_stockout() {
            Some(Exclusion::Stockout)
        } else if duration_days < 0.0 {
            tracing::debug!(
                start_age_days = start.age_in_days,
                end_age_days = end.age_in_days,
                "period bounds out of order; excluded"
            );
            Some(Exclusion::Chronology)
        } else if end.age_in_days >= self.window_length_days {
            Some(Exclusion::OutsideWindow)
        } else if implied_end < end.quantity {
            match self.policy {
                AnomalyPolicy::Exclude => {
                    tracing::debug!(
                        start_age_days = start.age_in_days,
                        end_age_days = end.age_in_days,
                        implied_end,
                        observed_end = end.quantity,
                        "anomalous period: more stock than receipts explain; excluded"
                    );
                    Some(Exclusion::Anomalous)
                }
                AnomalyPolicy::InferReceipts => {
                    period.inferred_receipts =
                        end.quantity - implied_end + open.reported_consumption;
                    period.consumption = open.reported_consumption;
                    tracing::debug!(
                        start_age_days = start.age_in_days,
                        end_age_days = end.age_in_days,
                        inferred_receipts = period.inferred_receipts,
                        "anomalous period reconciled with inferred receipt"
                    );
                    None
                }
            }
        } else {
            None
        };

        self.periods.push(period);
    }

    /// Fraction of `[end_age, start_age]` that lies within the window.
    fn scaling_factor(&self, end_age: f64, start_age: f64, duration_days: f64) -> f64 {
        if start_age <= self.window_length_days {
            1.0
        } else if end_age >= self.window_length_days || duration_days <= 0.0 {
            0.0
        } else {
            ((self.window_length_days - end_age) / duration_days).clamp(0.0, 1.0)
        }
    }

    fn finish(self) -> Segmentation {
        Segmentation {
            periods: self.periods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soh(q: f64, age: f64) -> Transaction {
        Transaction::stock_on_hand(q, age)
    }

    fn rec(q: f64, age: f64) -> Transaction {
        Transaction::receipt(q, age)
    }

    fn con(q: f64, age: f64) -> Transaction {
        Transaction::consumption(q, age)
    }

    #[test]
    fn single_period_accumulates_receipts() {
        let txs = vec![soh(25.0, 5.0), rec(12.0, 3.0), con(27.0, 0.0), soh(10.0, 0.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.periods.len(), 1);

        let p = &seg.periods[0];
        assert!(p.is_accepted());
        assert_eq!(p.start_balance, 25.0);
        assert_eq!(p.end_balance, 10.0);
        assert_eq!(p.receipts_within, 12.0);
        assert_eq!(p.consumption, 27.0);
        assert_eq!(p.duration_days, 5.0);
        assert_eq!(p.scaling_factor, 1.0);
    }

    #[test]
    fn receipts_newer_than_the_newest_count_are_ignored() {
        let txs = vec![soh(25.0, 5.0), soh(20.0, 1.0), rec(50.0, 0.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.periods.len(), 1);
        assert_eq!(seg.periods[0].receipts_within, 0.0);
        assert_eq!(seg.periods[0].consumption, 5.0);
    }

    #[test]
    fn stockout_voids_periods_on_both_sides() {
        let txs = vec![
            soh(25.0, 15.0),
            rec(12.0, 12.0),
            soh(33.0, 12.0),
            rec(3.0, 7.0),
            Transaction::stockout(7.0),
            rec(25.0, 5.0),
            soh(20.0, 5.0),
            rec(14.0, 0.0),
            soh(24.0, 0.0),
        ];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.periods.len(), 4);
        assert_eq!(seg.excluded_by(Exclusion::Stockout), 2);

        let accepted: Vec<_> = seg.accepted().collect();
        assert_eq!(accepted.len(), 2);
        assert_eq!((accepted[0].start_age_days, accepted[0].end_age_days), (5.0, 0.0));
        assert_eq!((accepted[1].start_age_days, accepted[1].end_age_days), (15.0, 12.0));
    }

    #[test]
    fn zero_count_behaves_like_stockout() {
        let explicit = vec![soh(10.0, 10.0), Transaction::stockout(5.0), soh(8.0, 0.0)];
        let zero = vec![soh(10.0, 10.0), soh(0.0, 5.0), soh(8.0, 0.0)];

        let a = segment(&explicit, 60.0, AnomalyPolicy::Exclude).unwrap();
        let b = segment(&zero, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(a.summarize(), b.summarize());
        assert_eq!(a.summarize().periods, 0);
    }

    #[test]
    fn anomalous_period_is_excluded_by_default() {
        let txs = vec![soh(25.0, 5.0), rec(10.0, 0.0), con(15.0, 0.0), soh(40.0, 0.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.excluded_by(Exclusion::Anomalous), 1);
        assert_eq!(seg.summarize().periods, 0);
    }

    #[test]
    fn inferred_receipts_reconcile_anomalous_period() {
        let txs = vec![soh(25.0, 5.0), rec(10.0, 0.0), con(15.0, 0.0), soh(40.0, 0.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::InferReceipts).unwrap();
        let p = &seg.periods[0];
        assert!(p.is_accepted());
        assert_eq!(p.inferred_receipts, 20.0);
        assert_eq!(p.consumption, 15.0);
    }

    #[test]
    fn straddling_period_is_prorated() {
        let txs = vec![soh(200.0, 65.0), rec(50.0, 50.0), soh(150.0, 50.0), soh(150.0, 0.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        let straddling = seg.periods.iter().find(|p| p.start_age_days == 65.0).unwrap();
        assert!((straddling.scaling_factor - 10.0 / 15.0).abs() < 1e-12);
        assert!((straddling.in_window_days() - 10.0).abs() < 1e-9);
        assert!((straddling.in_window_consumption() - 100.0 * 10.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn walk_stops_past_the_window() {
        let txs = vec![
            soh(500.0, 90.0),
            soh(400.0, 80.0),
            soh(300.0, 70.0),
            soh(250.0, 20.0),
            soh(200.0, 0.0),
        ];

        let seg = segment(&txs, 30.0, AnomalyPolicy::Exclude).unwrap();
        // 0..20 and the straddling 20..70; nothing older is visited.
        assert_eq!(seg.periods.len(), 2);
        assert!(seg.periods.iter().all(|p| p.start_age_days <= 70.0));
    }

    #[test]
    fn period_ending_at_window_edge_is_outside() {
        let txs = vec![soh(30.0, 40.0), soh(20.0, 30.0)];

        let seg = segment(&txs, 30.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.excluded_by(Exclusion::OutsideWindow), 1);
        assert_eq!(seg.summarize().periods, 0);
    }

    #[test]
    fn inferred_receipts_do_not_revive_periods_outside_window() {
        let txs = vec![soh(10.0, 40.0), con(5.0, 30.0), soh(20.0, 30.0), soh(15.0, 0.0)];

        for policy in [AnomalyPolicy::Exclude, AnomalyPolicy::InferReceipts] {
            let seg = segment(&txs, 30.0, policy).unwrap();
            assert_eq!(seg.excluded_by(Exclusion::OutsideWindow), 1);
            assert_eq!(seg.excluded_by(Exclusion::Anomalous), 0);
            assert_eq!(seg.summarize().periods, 1);

            let outside = seg.periods.iter().find(|p| p.start_age_days == 40.0).unwrap();
            assert!(outside.excluded());
            assert_eq!(outside.inferred_receipts, 0.0);
        }
    }

    #[test]
    fn out_of_order_bounds_are_excluded() {
        // Newest-first by list shape, but a middle count is older than its neighbour.
        let txs = vec![soh(10.0, 0.0), soh(12.0, 9.0), soh(15.0, 4.0), soh(20.0, 10.0)];

        let seg = segment(&txs, 60.0, AnomalyPolicy::Exclude).unwrap();
        assert_eq!(seg.excluded_by(Exclusion::Chronology), 1);
    }

    #[test]
    fn rejects_non_positive_window() {
        assert!(segment(&[], 0.0, AnomalyPolicy::Exclude).is_err());
        assert!(segment(&[], -3.0, AnomalyPolicy::Exclude).is_err());
        assert!(segment(&[], f64::NAN, AnomalyPolicy::Exclude).is_err());
    }

    #[test]
    fn rejects_invalid_transaction() {
        let txs = vec![soh(10.0, 2.0), soh(-1.0, 0.0)];
        assert!(segment(&txs, 60.0, AnomalyPolicy::Exclude).is_err());
    }

    #[test]
    fn empty_ledger_has_no_periods() {
        let seg = segment(&[], 60.0, AnomalyPolicy::Exclude).unwrap();
        assert!(seg.periods.is_empty());
        assert_eq!(seg.summarize().periods, 0);
    }
}
