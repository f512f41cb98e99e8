use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lotto_types::{Draw, DrawStatus, Nano};
use uuid::Uuid;

use super::DrawRepository;
use crate::error::DrawError;

#[derive(Default)]
pub struct InMemoryDrawRepository {
    draws: Mutex<HashMap<Uuid, Draw>>,
}

impl InMemoryDrawRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrawRepository for InMemoryDrawRepository {
    async fn insert(&self, draw: Draw) -> Result<Draw, DrawError> {
        let mut draws = self.draws.lock().unwrap();
        draws.insert(draw.id, draw.clone());
        Ok(draw)
    }

    async fn load(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        self.draws
            .lock()
            .unwrap()
            .get(&draw_id)
            .cloned()
            .ok_or(DrawError::NotFound(draw_id))
    }

    async fn next_draw_number(&self, lottery_id: Uuid) -> Result<i64, DrawError> {
        let draws = self.draws.lock().unwrap();
        let max = draws
            .values()
            .filter(|d| d.lottery_id == lottery_id)
            .map(|d| d.draw_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn find_open_draw(&self, lottery_id: Uuid, now: DateTime<Utc>) -> Result<Option<Draw>, DrawError> {
        let draws = self.draws.lock().unwrap();
        Ok(draws
            .values()
            .find(|d| d.lottery_id == lottery_id && d.is_accepting_purchases(now))
            .cloned())
    }

    async fn due_to_lock(&self, now: DateTime<Utc>, lock_ahead: Duration, limit: u32) -> Result<Vec<Draw>, DrawError> {
        let draws = self.draws.lock().unwrap();
        let mut out: Vec<Draw> = draws
            .values()
            .filter(|d| d.status == DrawStatus::Open && d.draw_time <= now + lock_ahead)
            .cloned()
            .collect();
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn due_to_execute(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Draw>, DrawError> {
        let draws = self.draws.lock().unwrap();
        let mut out: Vec<Draw> = draws
            .values()
            .filter(|d| d.status == DrawStatus::Locked && d.draw_time <= now)
            .cloned()
            .collect();
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn transition(
        &self,
        draw_id: Uuid,
        expected: DrawStatus,
        mutate: Box<dyn FnOnce(&mut Draw) + Send>,
    ) -> Result<Draw, DrawError> {
        let mut draws = self.draws.lock().unwrap();
        let draw = draws.get_mut(&draw_id).ok_or(DrawError::NotFound(draw_id))?;
        if draw.status != expected {
            return Err(DrawError::WrongState {
                draw_id,
                expected,
                actual: draw.status,
            });
        }
        mutate(draw);
        Ok(draw.clone())
    }

    async fn cancel(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        let mut draws = self.draws.lock().unwrap();
        let draw = draws.get_mut(&draw_id).ok_or(DrawError::NotFound(draw_id))?;
        if !matches!(draw.status, DrawStatus::Open | DrawStatus::Locked) {
            return Err(DrawError::WrongState {
                draw_id,
                expected: DrawStatus::Open,
                actual: draw.status,
            });
        }
        draw.status = DrawStatus::Cancelled;
        Ok(draw.clone())
    }

    async fn increment_ticket_totals(
        &self,
        draw_id: Uuid,
        ticket_count_delta: u32,
        amount_delta: Nano,
    ) -> Result<(), DrawError> {
        let mut draws = self.draws.lock().unwrap();
        let draw = draws.get_mut(&draw_id).ok_or(DrawError::NotFound(draw_id))?;
        draw.total_tickets += ticket_count_delta;
        draw.total_collected = draw.total_collected + amount_delta;
        Ok(())
    }
}
