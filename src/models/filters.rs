//! Customer list filtering, sorting and pagination.
//!
//! `CustomerFilters::apply` mirrors the server-side list semantics so the
//! cache can answer filtered queries without a round trip: status match,
//! case-insensitive substring search over a fixed set of fields, a stable
//! field sort, then page slicing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::customer::{Customer, CustomerStatus};

/// Default page size for customer list views.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Column to sort the customer list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    FirstName,
    LastName,
    Email,
    CreatedAt,
    TotalSpent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filter, sort and pagination parameters for a customer list query.
///
/// The same struct is sent to the remote API and applied locally by
/// `query_local`, so the two paths cannot drift apart in shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFilters {
    pub status: Option<CustomerStatus>,
    /// Case-insensitive substring match over first name, last name, email
    /// and phone.
    pub search: Option<String>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for CustomerFilters {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            sort_field: SortField::FirstName,
            sort_direction: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CustomerFilters {
    /// Apply filter, sort and pagination to a cached customer set.
    pub fn apply(&self, customers: &[Customer]) -> Vec<Customer> {
        let mut rows: Vec<&Customer> = customers.iter().collect();

        if let Some(status) = self.status {
            rows.retain(|c| c.status == status);
        }

        if let Some(ref query) = self.search {
            let query = query.to_lowercase();
            if !query.is_empty() {
                rows.retain(|c| customer_matches_search(c, &query));
            }
        }

        rows.sort_by(|a, b| {
            let primary = match self.sort_field {
                SortField::FirstName => cmp_ignore_case(&a.first_name, &b.first_name),
                SortField::LastName => cmp_ignore_case(&a.last_name, &b.last_name),
                SortField::Email => cmp_ignore_case(
                    a.email.as_deref().unwrap_or(""),
                    b.email.as_deref().unwrap_or(""),
                ),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::TotalSpent => a.total_spent_cents.cmp(&b.total_spent_cents),
            };
            let primary = match self.sort_direction {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            // Ties break on first name ascending regardless of direction,
            // so page boundaries stay stable.
            primary.then_with(|| cmp_ignore_case(&a.first_name, &b.first_name))
        });

        let page = self.page.max(1);
        let start = (page as usize - 1) * self.page_size as usize;
        rows.into_iter()
            .skip(start)
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

/// Check whether a customer matches a lowercased search query.
/// Searches first name, last name, email and phone.
fn customer_matches_search(customer: &Customer, query: &str) -> bool {
    contains_ignore_case(&customer.first_name, query)
        || contains_ignore_case(&customer.last_name, query)
        || customer
            .email
            .as_deref()
            .map(|e| contains_ignore_case(e, query))
            .unwrap_or(false)
        || customer
            .phone
            .as_deref()
            .map(|p| contains_ignore_case(p, query))
            .unwrap_or(false)
}

/// Case-insensitive string comparison without allocation.
fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.chars().map(|c| c.to_ascii_lowercase()))
}

/// Case-insensitive substring check. `query` must already be lowercased.
fn contains_ignore_case(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: i64, first: &str, last: &str, status: CustomerStatus) -> Customer {
        Customer {
            id,
            operator_id: 1,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(format!("{}@example.com", first.to_lowercase())),
            phone: None,
            status,
            booking_count: 0,
            total_spent_cents: id * 100,
            created_at: None,
            notes: None,
        }
    }

    fn sample() -> Vec<Customer> {
        vec![
            customer(1, "Carol", "Young", CustomerStatus::Active),
            customer(2, "alice", "Smith", CustomerStatus::Active),
            customer(3, "Bob", "Jones", CustomerStatus::Blocked),
            customer(4, "Dave", "smith", CustomerStatus::Inactive),
        ]
    }

    #[test]
    fn test_status_filter() {
        let filters = CustomerFilters {
            status: Some(CustomerStatus::Active),
            ..Default::default()
        };
        let result = filters.apply(&sample());
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| c.status == CustomerStatus::Active));
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let filters = CustomerFilters {
            search: Some("SMITH".to_string()),
            ..Default::default()
        };
        let result = filters.apply(&sample());
        assert_eq!(result.len(), 2);

        // Email is searchable too
        let filters = CustomerFilters {
            search: Some("carol@".to_string()),
            ..Default::default()
        };
        let result = filters.apply(&sample());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
    }

    #[test]
    fn test_default_sort_is_first_name_ascending() {
        let result = CustomerFilters::default().apply(&sample());
        let names: Vec<&str> = result.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "Bob", "Carol", "Dave"]);
    }

    #[test]
    fn test_descending_sort_keeps_ascending_tiebreak() {
        let filters = CustomerFilters {
            sort_field: SortField::LastName,
            sort_direction: SortDirection::Desc,
            ..Default::default()
        };
        let result = filters.apply(&sample());
        let names: Vec<&str> = result.iter().map(|c| c.first_name.as_str()).collect();
        // Young > Smith > Jones; the two Smiths tie-break alice < Dave.
        assert_eq!(names, vec!["Carol", "alice", "Dave", "Bob"]);
    }

    #[test]
    fn test_pagination_slices() {
        let filters = CustomerFilters {
            page: 2,
            page_size: 3,
            ..Default::default()
        };
        let result = filters.apply(&sample());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].first_name, "Dave");
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let filters = CustomerFilters {
            page: 5,
            page_size: 10,
            ..Default::default()
        };
        assert!(filters.apply(&sample()).is_empty());
    }
}
