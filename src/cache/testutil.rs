//! Shared test doubles for cache tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::models::{Customer, CustomerFilters, CustomerListResponse, CustomerStatus, Pagination};

use super::staleness::Clock;
use super::sync::CustomerSource;

/// Build a minimal customer record for tests.
pub(crate) fn customer(id: i64, first_name: &str) -> Customer {
    Customer {
        id,
        operator_id: 7,
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: Some(format!("{}@example.com", first_name.to_lowercase())),
        phone: None,
        status: CustomerStatus::Active,
        booking_count: 0,
        total_spent_cents: 0,
        created_at: None,
        notes: None,
    }
}

/// Scripted `CustomerSource`: counts calls, can fail on demand and can
/// delay responses to widen the in-flight window.
pub(crate) struct StubSource {
    pub calls: AtomicUsize,
    customers: Mutex<Vec<Customer>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl StubSource {
    pub fn with_customers(customers: Vec<Customer>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            customers: Mutex::new(customers),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_customers(&self, customers: Vec<Customer>) {
        *self.customers.lock().unwrap() = customers;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }
}

impl CustomerSource for StubSource {
    fn fetch_list(
        &self,
        _operator_id: i64,
        filters: CustomerFilters,
    ) -> BoxFuture<'_, Result<CustomerListResponse>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("stub network failure");
            }
            let customers = self.customers.lock().unwrap().clone();
            let total_count = customers.len() as u64;
            Ok(CustomerListResponse {
                customers,
                pagination: Pagination {
                    page: filters.page,
                    page_size: filters.page_size,
                    total_count,
                    total_pages: 1,
                },
            })
        }
        .boxed()
    }
}

/// Settable clock so tests control staleness without sleeping.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
