//! Filters, ordering and paging for transaction listings and searches.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    PageRequest,
    database_id::{BudgetId, WalletId},
    transaction::{Transaction, TransactionType},
};

/// Which transactions of a user to include in a listing or search.
///
/// Every field that is set must match. The default filter matches all
/// transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Case-insensitive substring of the description. An empty string matches everything.
    pub search_term: Option<String>,
    /// Inclusive lower bound on the date.
    pub from_date: Option<OffsetDateTime>,
    /// Inclusive upper bound on the date.
    pub until_date: Option<OffsetDateTime>,
    /// Only transactions counted against this budget.
    pub budget_id: Option<BudgetId>,
    /// Only transactions in this wallet.
    pub wallet_id: Option<WalletId>,
    /// Only income or only expenses.
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    /// The search term, if one was given and it is not empty.
    pub fn search_term(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .filter(|search_term| !search_term.is_empty())
    }

    /// Whether `transaction` passes every condition of the filter.
    ///
    /// Ownership is not part of the filter, stores scope queries by user
    /// before applying it.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(search_term) = self.search_term() {
            let description = transaction.description.to_lowercase();

            if !description.contains(&search_term.to_lowercase()) {
                return false;
            }
        }

        if self
            .from_date
            .is_some_and(|from_date| transaction.date < from_date)
        {
            return false;
        }

        if self
            .until_date
            .is_some_and(|until_date| transaction.date > until_date)
        {
            return false;
        }

        if self.budget_id.is_some() && transaction.budget_id != self.budget_id {
            return false;
        }

        if self
            .wallet_id
            .is_some_and(|wallet_id| transaction.wallet_id != wallet_id)
        {
            return false;
        }

        self.transaction_type
            .is_none_or(|transaction_type| transaction.transaction_type == transaction_type)
    }
}

/// A transaction as shown in a listing, with the names of its wallet and
/// budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    #[serde(flatten)]
    pub transaction: Transaction,
    /// Empty if the wallet could not be found.
    pub wallet_name: String,
    /// `None` if the transaction has no budget or the budget could not be found.
    pub budget_name: Option<String>,
}

/// A slice of an ordered result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    /// The number of leading items to skip.
    pub offset: u64,
    /// The maximum number of items to return. `None` returns the rest.
    pub limit: Option<u64>,
}

/// The listing order for transactions: most recent first, and for equal
/// dates the higher ID first.
pub fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    b.date.cmp(&a.date).then(b.id.cmp(&a.id))
}

/// A search over a user's transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Which transactions to include.
    #[serde(flatten)]
    pub filter: TransactionFilter,
    /// The page number.
    pub page: Option<u64>,
    /// The page size.
    pub page_size: Option<u64>,
}

impl SearchCriteria {
    /// The page requested by the criteria.
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// The transactions on the page, in listing order.
    pub transactions: Vec<TransactionRow>,
    /// The number of transactions matching the filter across all pages.
    pub total: u64,
    /// The page number that was returned.
    pub page: u64,
    /// The page size that was used.
    pub page_size: u64,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        UserID,
        transaction::{Transaction, TransactionFilter, TransactionType, newest_first},
    };

    fn transaction(id: i64, description: &str) -> Transaction {
        Transaction::build(100, TransactionType::Expense, 1, description)
            .date(datetime!(2025-06-15 12:00 UTC))
            .budget_id(Some(3))
            .finalize(id, UserID::new(1))
    }

    #[test]
    fn default_filter_matches_everything() {
        assert!(TransactionFilter::default().matches(&transaction(1, "Groceries")));
    }

    #[test]
    fn search_term_is_case_insensitive_substring() {
        let filter = TransactionFilter {
            search_term: Some("CERI".to_owned()),
            ..Default::default()
        };

        assert!(filter.matches(&transaction(1, "Groceries")));
        assert!(!filter.matches(&transaction(2, "Rent")));
    }

    #[test]
    fn empty_search_term_matches_everything() {
        let filter = TransactionFilter {
            search_term: Some(String::new()),
            ..Default::default()
        };

        assert!(filter.matches(&transaction(1, "Rent")));
    }

    #[test]
    fn date_range_is_inclusive() {
        let filter = TransactionFilter {
            from_date: Some(datetime!(2025-06-15 12:00 UTC)),
            until_date: Some(datetime!(2025-06-15 12:00 UTC)),
            ..Default::default()
        };

        assert!(filter.matches(&transaction(1, "Rent")));
    }

    #[test]
    fn date_range_excludes_outside() {
        let filter = TransactionFilter {
            from_date: Some(datetime!(2025-06-16 00:00 UTC)),
            ..Default::default()
        };

        assert!(!filter.matches(&transaction(1, "Rent")));
    }

    #[test]
    fn budget_wallet_and_type_must_match() {
        let t = transaction(1, "Rent");

        let wrong_budget = TransactionFilter {
            budget_id: Some(4),
            ..Default::default()
        };
        let wrong_wallet = TransactionFilter {
            wallet_id: Some(2),
            ..Default::default()
        };
        let wrong_type = TransactionFilter {
            transaction_type: Some(TransactionType::Income),
            ..Default::default()
        };
        let all_right = TransactionFilter {
            budget_id: Some(3),
            wallet_id: Some(1),
            transaction_type: Some(TransactionType::Expense),
            ..Default::default()
        };

        assert!(!wrong_budget.matches(&t));
        assert!(!wrong_wallet.matches(&t));
        assert!(!wrong_type.matches(&t));
        assert!(all_right.matches(&t));
    }

    #[test]
    fn newest_first_breaks_ties_by_higher_id() {
        let t1 = transaction(1, "t1").date.replace_date(time::macros::date!(2025 - 06 - 20));
        let mut transactions = vec![
            Transaction {
                date: t1,
                ..transaction(1, "t1")
            },
            transaction(2, "t2"),
            transaction(3, "t3"),
            Transaction {
                date: datetime!(2025-06-01 00:00 UTC),
                ..transaction(4, "t4")
            },
        ];

        transactions.sort_by(newest_first);

        let ids: Vec<_> = transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);
    }
}
