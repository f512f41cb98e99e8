use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lotto_types::{Currency, Draw, DrawStatus, Lottery, Nano, PayoutAmounts, WinnerCounts};
use uuid::Uuid;

use crate::error::DrawError;
use crate::repository::DrawRepository;

/// Sales close this long before the draw (spec §4.4 invariant
/// `salesCloseAt = drawTime - 30 minutes`).
pub const SALES_CUTOFF: Duration = Duration::minutes(30);

/// Draw State Machine (spec §4.4, C4). Every method is one transactional
/// transition; illegal transitions surface as `DrawError::WrongState`
/// rather than silently no-opping.
pub struct DrawService {
    repository: Arc<dyn DrawRepository>,
}

impl DrawService {
    pub fn new(repository: Arc<dyn DrawRepository>) -> Self {
        DrawService { repository }
    }

    /// `createDraw(lotteryId, drawTime) -> (drawId, serverSeed, serverSeedHash)`.
    /// Persists directly into `Open` (spec §4.4: "initial state is OPEN").
    pub async fn create_draw(
        &self,
        lottery: &Lottery,
        draw_time: DateTime<Utc>,
    ) -> Result<(Draw, String), DrawError> {
        let draw_number = self.repository.next_draw_number(lottery.id).await?;
        let server_seed = lotto_rng::generate_server_seed();
        let server_seed_hash = lotto_rng::hash_server_seed(&server_seed);
        let now = Utc::now();
        let draw = Draw {
            id: Uuid::new_v4(),
            lottery_id: lottery.id,
            draw_number,
            status: DrawStatus::Open,
            currency: lottery.currency,
            sales_open_at: now,
            sales_close_at: draw_time - SALES_CUTOFF,
            draw_time,
            locked_at: None,
            drawn_at: None,
            completed_at: None,
            server_seed_hash,
            server_seed: None,
            client_seed: None,
            client_seed_block_number: None,
            nonce: draw_number as u64,
            winning_numbers: Vec::new(),
            winner_counts: WinnerCounts::default(),
            payout_amounts: PayoutAmounts::default(),
            total_paid_out: Nano::ZERO,
            total_tickets: 0,
            total_collected: Nano::ZERO,
        };
        let inserted = self.repository.insert(draw).await?;
        Ok((inserted, server_seed))
    }

    pub async fn lock_draw(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        let now = Utc::now();
        self.repository
            .transition(
                draw_id,
                DrawStatus::Open,
                Box::new(move |draw| {
                    draw.status = DrawStatus::Locked;
                    draw.locked_at = Some(now);
                }),
            )
            .await
    }

    /// Verifies `serverSeed` against the committed hash and enters
    /// `Drawing`. A mismatch is an integrity failure, not a retryable
    /// one: the commit was supposed to make this impossible.
    pub async fn begin_drawing(&self, draw_id: Uuid, server_seed: &str) -> Result<Draw, DrawError> {
        let draw = self.repository.load(draw_id).await?;
        if lotto_rng::hash_server_seed(server_seed) != draw.server_seed_hash {
            return Err(DrawError::SeedMismatch);
        }
        let seed = server_seed.to_string();
        self.repository
            .transition(
                draw_id,
                DrawStatus::Locked,
                Box::new(move |draw| {
                    draw.status = DrawStatus::Drawing;
                    draw.server_seed = Some(seed);
                }),
            )
            .await
    }

    /// RNG succeeded: advance to `Calculating` with the winning numbers
    /// and the seeds/nonce that produced them recorded for audit.
    pub async fn finish_drawing(
        &self,
        draw_id: Uuid,
        winning_numbers: Vec<u32>,
        client_seed: String,
        client_seed_block_number: u64,
    ) -> Result<Draw, DrawError> {
        let now = Utc::now();
        self.repository
            .transition(
                draw_id,
                DrawStatus::Drawing,
                Box::new(move |draw| {
                    draw.status = DrawStatus::Calculating;
                    draw.winning_numbers = winning_numbers;
                    draw.client_seed = Some(client_seed);
                    draw.client_seed_block_number = Some(client_seed_block_number);
                    draw.drawn_at = Some(now);
                }),
            )
            .await
    }

    /// RNG failed (e.g. the Chain port could not supply a client seed):
    /// revert to `Locked` so the scheduler retries next tick.
    pub async fn fail_drawing(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        self.repository
            .transition(
                draw_id,
                DrawStatus::Drawing,
                Box::new(|draw| draw.status = DrawStatus::Locked),
            )
            .await
    }

    /// Calculation succeeded: advance to `Paying` with the winner counts
    /// and per-tier amounts the calculator produced.
    pub async fn finish_calculating(
        &self,
        draw_id: Uuid,
        winner_counts: WinnerCounts,
        payout_amounts: PayoutAmounts,
        total_paid_out: Nano,
    ) -> Result<Draw, DrawError> {
        self.repository
            .transition(
                draw_id,
                DrawStatus::Calculating,
                Box::new(move |draw| {
                    draw.status = DrawStatus::Paying;
                    draw.winner_counts = winner_counts;
                    draw.payout_amounts = payout_amounts;
                    draw.total_paid_out = total_paid_out;
                }),
            )
            .await
    }

    /// Calculation failed (e.g. `InsufficientReserve`): revert to
    /// `Locked` so it is safe to retry, per spec §4.3's idempotence
    /// guarantee.
    pub async fn fail_calculating(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        self.repository
            .transition(
                draw_id,
                DrawStatus::Calculating,
                Box::new(|draw| draw.status = DrawStatus::Locked),
            )
            .await
    }

    pub async fn complete_draw(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        let now = Utc::now();
        self.repository
            .transition(
                draw_id,
                DrawStatus::Paying,
                Box::new(move |draw| {
                    draw.status = DrawStatus::Completed;
                    draw.completed_at = Some(now);
                }),
            )
            .await
    }

    pub async fn cancel_draw(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        self.repository.cancel(draw_id).await
    }

    pub async fn is_accepting_purchases(&self, draw_id: Uuid) -> Result<bool, DrawError> {
        let draw = self.repository.load(draw_id).await?;
        Ok(draw.is_accepting_purchases(Utc::now()))
    }

    pub async fn find_open_draw(&self, lottery_id: Uuid) -> Result<Option<Draw>, DrawError> {
        self.repository.find_open_draw(lottery_id, Utc::now()).await
    }

    pub async fn due_to_lock(&self, limit: u32) -> Result<Vec<Draw>, DrawError> {
        self.repository.due_to_lock(Utc::now(), SALES_CUTOFF, limit).await
    }

    pub async fn due_to_execute(&self, limit: u32) -> Result<Vec<Draw>, DrawError> {
        self.repository.due_to_execute(Utc::now(), limit).await
    }

    pub async fn record_ticket_sale(
        &self,
        draw_id: Uuid,
        ticket_count: u32,
        amount: Nano,
    ) -> Result<(), DrawError> {
        self.repository
            .increment_ticket_totals(draw_id, ticket_count, amount)
            .await
    }

    pub async fn load(&self, draw_id: Uuid) -> Result<Draw, DrawError> {
        self.repository.load(draw_id).await
    }
}

/// The next draw's scheduled time given a cadence, applied by the
/// Scheduler after a draw completes (spec §4.5 step 3).
pub fn next_draw_time(cadence: lotto_types::DrawCadence, previous: DateTime<Utc>) -> DateTime<Utc> {
    match cadence {
        lotto_types::DrawCadence::Hourly => previous + Duration::hours(1),
        lotto_types::DrawCadence::Daily => previous + Duration::days(1),
        lotto_types::DrawCadence::Weekly => previous + Duration::weeks(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryDrawRepository;
    use lotto_types::DrawCadence;

    fn lottery() -> Lottery {
        Lottery {
            id: Uuid::new_v4(),
            slug: "daily-6-46".into(),
            active: true,
            numbers_count: 6,
            numbers_max: 46,
            ticket_price_nano: Nano(2_500_000),
            base_jackpot: Nano(500_000_000_000),
            accumulated_jackpot: Nano(500_000_000_000),
            currency: Currency::Ton,
            cadence: DrawCadence::Daily,
            draw_hour: 20,
        }
    }

    #[tokio::test]
    async fn full_happy_path() {
        let repo = Arc::new(InMemoryDrawRepository::new());
        let service = DrawService::new(repo);
        let lottery = lottery();
        let draw_time = Utc::now() + Duration::hours(1);
        let (draw, server_seed) = service.create_draw(&lottery, draw_time).await.unwrap();
        assert_eq!(draw.status, DrawStatus::Open);

        service.lock_draw(draw.id).await.unwrap();
        let drawing = service.begin_drawing(draw.id, &server_seed).await.unwrap();
        assert_eq!(drawing.status, DrawStatus::Drawing);

        let calculating = service
            .finish_drawing(draw.id, vec![1, 2, 3, 4, 5, 6], "client-seed".into(), 1)
            .await
            .unwrap();
        assert_eq!(calculating.status, DrawStatus::Calculating);

        let paying = service
            .finish_calculating(draw.id, WinnerCounts::default(), PayoutAmounts::default(), Nano::ZERO)
            .await
            .unwrap();
        assert_eq!(paying.status, DrawStatus::Paying);

        let completed = service.complete_draw(draw.id).await.unwrap();
        assert_eq!(completed.status, DrawStatus::Completed);
        assert!(completed.status.is_terminal());
    }

    #[tokio::test]
    async fn wrong_state_transition_rejected() {
        let repo = Arc::new(InMemoryDrawRepository::new());
        let service = DrawService::new(repo);
        let lottery = lottery();
        let (draw, _) = service.create_draw(&lottery, Utc::now()).await.unwrap();
        let err = service.complete_draw(draw.id).await.unwrap_err();
        assert!(matches!(err, DrawError::WrongState { .. }));
    }

    #[tokio::test]
    async fn seed_mismatch_is_rejected() {
        let repo = Arc::new(InMemoryDrawRepository::new());
        let service = DrawService::new(repo);
        let lottery = lottery();
        let (draw, _) = service.create_draw(&lottery, Utc::now()).await.unwrap();
        service.lock_draw(draw.id).await.unwrap();
        let err = service.begin_drawing(draw.id, "wrong-seed").await.unwrap_err();
        assert!(matches!(err, DrawError::SeedMismatch));
    }

    #[tokio::test]
    async fn rng_failure_reverts_to_locked() {
        let repo = Arc::new(InMemoryDrawRepository::new());
        let service = DrawService::new(repo);
        let lottery = lottery();
        let (draw, server_seed) = service.create_draw(&lottery, Utc::now()).await.unwrap();
        service.lock_draw(draw.id).await.unwrap();
        service.begin_drawing(draw.id, &server_seed).await.unwrap();
        let reverted = service.fail_drawing(draw.id).await.unwrap();
        assert_eq!(reverted.status, DrawStatus::Locked);
    }

    #[tokio::test]
    async fn cancel_from_open_or_locked_only() {
        let repo = Arc::new(InMemoryDrawRepository::new());
        let service = DrawService::new(repo);
        let lottery = lottery();
        let (draw, _) = service.create_draw(&lottery, Utc::now()).await.unwrap();
        let cancelled = service.cancel_draw(draw.id).await.unwrap();
        assert_eq!(cancelled.status, DrawStatus::Cancelled);
        assert!(service.cancel_draw(draw.id).await.is_err());
    }
}
