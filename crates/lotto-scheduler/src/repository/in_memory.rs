use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lotto_types::{Lottery, Nano, PayoutConfig};
use uuid::Uuid;

use super::LotteryRepository;
use crate::error::SchedulerError;

#[derive(Default)]
pub struct InMemoryLotteryRepository {
    lotteries: Mutex<HashMap<Uuid, Lottery>>,
    configs: Mutex<HashMap<Uuid, PayoutConfig>>,
    seeds: Mutex<HashMap<Uuid, String>>,
}

impl InMemoryLotteryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_lottery(&self, lottery: Lottery, config: PayoutConfig) {
        let id = lottery.id;
        self.lotteries.lock().unwrap().insert(id, lottery);
        self.configs.lock().unwrap().insert(id, config);
    }
}

#[async_trait]
impl LotteryRepository for InMemoryLotteryRepository {
    async fn active_lotteries(&self) -> Result<Vec<Lottery>, SchedulerError> {
        Ok(self
            .lotteries
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.active)
            .cloned()
            .collect())
    }

    async fn lottery(&self, lottery_id: Uuid) -> Result<Option<Lottery>, SchedulerError> {
        Ok(self.lotteries.lock().unwrap().get(&lottery_id).cloned())
    }

    async fn payout_config(&self, lottery_id: Uuid) -> Result<Option<PayoutConfig>, SchedulerError> {
        Ok(self.configs.lock().unwrap().get(&lottery_id).cloned())
    }

    async fn update_accumulated_jackpot(&self, lottery_id: Uuid, amount: Nano) -> Result<(), SchedulerError> {
        if let Some(lottery) = self.lotteries.lock().unwrap().get_mut(&lottery_id) {
            lottery.accumulated_jackpot = amount;
        }
        Ok(())
    }

    async fn store_seed(&self, draw_id: Uuid, server_seed: &str) -> Result<(), SchedulerError> {
        self.seeds.lock().unwrap().insert(draw_id, server_seed.to_string());
        Ok(())
    }

    async fn take_seed(&self, draw_id: Uuid) -> Result<Option<String>, SchedulerError> {
        Ok(self.seeds.lock().unwrap().remove(&draw_id))
    }
}
