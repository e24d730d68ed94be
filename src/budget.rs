//! Client-side spend limits.
//!
//! A [`BudgetManager`] is shared by every call a client makes. It gates candidate payments
//! against a per-payment ceiling, a per-minute payment count and an hourly spend ceiling,
//! and keeps a 24h ledger of what was actually paid.
//!
//! All counters and the ledger sit behind one mutex. Nothing inside the critical sections
//! blocks or awaits.

use crate::errors::{Result, X402Error};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Spend limits. Every limit is optional; an empty config allows everything.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BudgetConfig {
    /// Largest single payment, in the asset's smallest unit
    pub max_payment_amount: Option<u128>,

    /// Most that may be spent within one hourly window
    pub max_hourly_spend: Option<u128>,

    /// Most payments that may be made within one minute window
    pub max_payments_per_minute: Option<u32>,
}

impl BudgetConfig {
    /// Creates a config without limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-payment ceiling.
    pub fn with_max_payment_amount(mut self, amount: u128) -> Self {
        self.max_payment_amount = Some(amount);
        self
    }

    /// Sets the hourly spend ceiling.
    pub fn with_max_hourly_spend(mut self, amount: u128) -> Self {
        self.max_hourly_spend = Some(amount);
        self
    }

    /// Sets the per-minute payment count ceiling.
    pub fn with_max_payments_per_minute(mut self, count: u32) -> Self {
        self.max_payments_per_minute = Some(count);
        self
    }
}

/// One recorded payment.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// When the payment was recorded
    pub timestamp: DateTime<Utc>,
    /// Amount in the asset's smallest unit
    pub amount: u128,
    /// Resource that was paid for
    pub resource: String,
}

/// Snapshot of spend so far.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetMetrics {
    /// Lifetime total
    pub total_spent: u128,
    /// Spend within the current hourly window
    pub hourly_spent: u128,
    /// Lifetime payment count
    pub payment_count: u64,
    /// Payments within the current minute window
    pub payments_this_minute: u32,
    /// Entries currently kept in the 24h ledger
    pub ledger_entries: usize,
}

#[derive(Debug)]
struct Window {
    end: DateTime<Utc>,
    length: Duration,
}

impl Window {
    fn new(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            end: now + length,
            length,
        }
    }

    /// Returns true if the window elapsed and was restarted at `now`.
    fn roll(&mut self, now: DateTime<Utc>) -> bool {
        if now >= self.end {
            self.end = now + self.length;
            true
        } else {
            false
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

#[derive(Debug)]
struct BudgetState {
    minute: Window,
    minute_count: u32,
    hour: Window,
    hourly_spent: u128,
    total_spent: u128,
    payment_count: u64,
    ledger: VecDeque<LedgerEntry>,
}

impl BudgetState {
    fn roll_windows(&mut self, now: DateTime<Utc>) {
        if self.minute.roll(now) {
            self.minute_count = 0;
        }
        if self.hour.roll(now) {
            self.hourly_spent = 0;
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(24);
        while self.ledger.front().is_some_and(|e| e.timestamp < cutoff) {
            self.ledger.pop_front();
        }
    }
}

/// Thread-safe budget and rate-limit accounting.
///
/// # Examples
///
/// ```
/// use x402_rpc::budget::{BudgetConfig, BudgetManager};
///
/// let budget = BudgetManager::new(BudgetConfig::new().with_max_payment_amount(500));
/// assert!(budget.can_spend(400, "mcp://tools/search").is_ok());
/// assert!(budget.can_spend(1000, "mcp://tools/search").is_err());
/// ```
#[derive(Debug)]
pub struct BudgetManager {
    config: BudgetConfig,
    state: Mutex<BudgetState>,
}

impl BudgetManager {
    /// Creates a manager whose windows start now.
    pub fn new(config: BudgetConfig) -> Self {
        Self::starting_at(config, Utc::now())
    }

    /// Creates a manager whose windows start at `now`.
    pub fn starting_at(config: BudgetConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            state: Mutex::new(BudgetState {
                minute: Window::new(now, Duration::minutes(1)),
                minute_count: 0,
                hour: Window::new(now, Duration::hours(1)),
                hourly_spent: 0,
                total_spent: 0,
                payment_count: 0,
                ledger: VecDeque::new(),
            }),
        }
    }

    /// Returns the configured limits.
    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Checks whether a payment of `amount` for `resource` is allowed right now.
    pub fn can_spend(&self, amount: u128, resource: &str) -> Result<()> {
        self.can_spend_at(amount, resource, Utc::now())
    }

    /// Checks whether a payment of `amount` for `resource` is allowed at `now`.
    ///
    /// Checks run in order: per-payment ceiling, per-minute count, hourly spend.
    pub fn can_spend_at(&self, amount: u128, resource: &str, now: DateTime<Utc>) -> Result<()> {
        if let Some(max) = self.config.max_payment_amount {
            if amount > max {
                warn!(amount, max, resource, "payment over per-payment ceiling");
                return Err(X402Error::PolicyRejection(format!(
                    "payment of {} exceeds the per-payment limit of {}",
                    amount, max
                )));
            }
        }

        let mut state = self.lock();
        state.roll_windows(now);

        if let Some(max) = self.config.max_payments_per_minute {
            if state.minute_count >= max {
                warn!(count = state.minute_count, max, resource, "payment rate limit reached");
                return Err(X402Error::PolicyRejection(format!(
                    "rate limit of {} payments per minute reached",
                    max
                )));
            }
        }

        if let Some(max) = self.config.max_hourly_spend {
            let projected = state.hourly_spent.saturating_add(amount);
            if projected > max {
                warn!(spent = state.hourly_spent, amount, max, resource, "hourly budget exhausted");
                return Err(X402Error::PolicyRejection(format!(
                    "payment of {} would bring hourly spend to {}, over the limit of {}",
                    amount, projected, max
                )));
            }
        }

        Ok(())
    }

    /// Records a payment that was made.
    pub fn record_payment(&self, amount: u128, resource: &str) {
        self.record_payment_at(amount, resource, Utc::now());
    }

    /// Records a payment that was made at `now`.
    pub fn record_payment_at(&self, amount: u128, resource: &str, now: DateTime<Utc>) {
        let mut state = self.lock();
        state.roll_windows(now);

        state.minute_count = state.minute_count.saturating_add(1);
        state.hourly_spent = state.hourly_spent.saturating_add(amount);
        state.total_spent = state.total_spent.saturating_add(amount);
        state.payment_count += 1;
        state.ledger.push_back(LedgerEntry {
            timestamp: now,
            amount,
            resource: resource.to_string(),
        });
        state.prune(now);

        debug!(
            amount,
            resource,
            hourly_spent = state.hourly_spent,
            total_spent = state.total_spent,
            "recorded payment"
        );
    }

    /// Returns a snapshot of current spend.
    pub fn metrics(&self) -> BudgetMetrics {
        self.metrics_at(Utc::now())
    }

    /// Returns a snapshot of spend as seen at `now`. Elapsed windows read as empty.
    pub fn metrics_at(&self, now: DateTime<Utc>) -> BudgetMetrics {
        let state = self.lock();
        BudgetMetrics {
            total_spent: state.total_spent,
            hourly_spent: if state.hour.is_expired(now) {
                0
            } else {
                state.hourly_spent
            },
            payment_count: state.payment_count,
            payments_this_minute: if state.minute.is_expired(now) {
                0
            } else {
                state.minute_count
            },
            ledger_entries: state.ledger.len(),
        }
    }

    /// Returns the payments recorded in the last 24 hours, oldest first.
    pub fn recent_payments(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
