use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use lotto_types::{Currency, Fund, FundCounters, FundTransaction, Pools};
use uuid::Uuid;

use super::FundRepository;
use crate::error::LedgerError;

#[derive(Default)]
struct Inner {
    funds: HashMap<(Uuid, &'static str), Fund>,
    transactions: Vec<FundTransaction>,
}

fn key(currency: Currency) -> &'static str {
    match currency {
        Currency::Ton => "TON",
        Currency::Usdt => "USDT",
    }
}

/// HashMap-backed fake used by unit tests and the rest of the
/// workspace's test suites so nothing needs a live Postgres instance.
#[derive(Default)]
pub struct InMemoryFundRepository {
    inner: Mutex<Inner>,
}

impl InMemoryFundRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FundRepository for InMemoryFundRepository {
    async fn get_or_create_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Fund, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let fund = inner
            .funds
            .entry((lottery_id, key(currency)))
            .or_insert_with(|| Fund {
                lottery_id,
                currency,
                pools: Pools::ZERO,
                counters: FundCounters::ZERO,
                updated_at: Utc::now(),
            })
            .clone();
        Ok(fund)
    }

    /// Holds the mutex across the whole read-modify-write so two
    /// concurrent callers against the same `(lottery_id, currency)`
    /// never interleave between reading and writing the pools.
    async fn mutate_fund(
        &self,
        lottery_id: Uuid,
        currency: Currency,
        mutate: Box<dyn Fn(&mut Fund) -> Result<FundTransaction, LedgerError> + Send>,
    ) -> Result<Fund, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let mut fund = inner
            .funds
            .entry((lottery_id, key(currency)))
            .or_insert_with(|| Fund {
                lottery_id,
                currency,
                pools: Pools::ZERO,
                counters: FundCounters::ZERO,
                updated_at: Utc::now(),
            })
            .clone();
        let transaction = mutate(&mut fund)?;
        fund.updated_at = Utc::now();
        inner.funds.insert((lottery_id, key(currency)), fund.clone());
        inner.transactions.push(transaction);
        Ok(fund)
    }

    async fn list_transactions(
        &self,
        lottery_id: Uuid,
        currency: Currency,
    ) -> Result<Vec<FundTransaction>, sqlx::Error> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.lottery_id == lottery_id && t.currency == currency)
            .cloned()
            .collect())
    }
}
