use crate::engine::LotteryEngine;
use crate::events::LotteryEvent;
use crate::model::{
    Lottery, LotteryInfo, LotteryMetadata, LotteryParams, LotteryState, PhaseTimes,
};
use crate::{LotteryError, Result};
use sealdraw_core::{Address, LotteryId};

/// Lottery creation and read-only queries.
pub trait LotteryRegistry {
    /// Owner-only. Returns the new lottery's id.
    fn create_lottery(&self, caller: Address, params: LotteryParams) -> Result<LotteryId>;

    fn lottery_info(&self, id: LotteryId) -> Result<LotteryInfo>;

    fn lottery_url(&self, id: LotteryId) -> Result<LotteryMetadata>;

    fn lottery_sales(&self, id: LotteryId) -> Result<u64>;

    /// Number of lotteries created so far, 0 when none.
    fn current_lottery_no(&self) -> Result<u64>;

    fn lottery_phase_times(&self, id: LotteryId) -> Result<PhaseTimes>;

    fn lottery_state(&self, id: LotteryId) -> Result<LotteryState>;

    /// Token the lottery settles in, if one is known yet.
    fn lottery_payment_token(&self, id: LotteryId) -> Result<Option<Address>>;

    fn lottery_ids(&self) -> Result<Vec<LotteryId>>;

    /// Full record, for display.
    fn lottery(&self, id: LotteryId) -> Result<Lottery>;
}

fn validate_params(params: &LotteryParams, now: i64) -> Result<()> {
    if params.ticket_price.is_zero() {
        return Err(LotteryError::validation("ticket price must be greater than 0"));
    }
    if params.ticket_count == 0 {
        return Err(LotteryError::validation("ticket count must be greater than 0"));
    }
    if params.num_winners == 0 || params.num_winners > params.ticket_count {
        return Err(LotteryError::validation(format!(
            "number of winners must be between 1 and {}",
            params.ticket_count
        )));
    }
    if params.min_percentage == 0 || params.min_percentage > 100 {
        return Err(LotteryError::validation(
            "minimum percentage must be between 1 and 100",
        ));
    }
    if params.end_time <= now {
        return Err(LotteryError::validation("end time must be in the future"));
    }
    if params.end_time.checked_sub(now).is_none() {
        return Err(LotteryError::validation("lottery window is too long"));
    }
    Ok(())
}

impl LotteryRegistry for LotteryEngine {
    fn create_lottery(&self, caller: Address, params: LotteryParams) -> Result<LotteryId> {
        let _op = self.enter("create_lottery")?;
        self.require_owner(caller)?;

        let now = self.now();
        validate_params(&params, now)?;

        let id = self.store().lottery_count()? + 1;
        let lottery = Lottery::new(id, caller, now, params);

        let mut tx = self.store().begin()?;
        tx.put_lottery(&lottery)?;
        tx.append_event(now, &LotteryEvent::LotteryCreated { lottery_id: id })?;
        tx.commit()?;

        tracing::info!(
            "Created lottery {}: {} tickets at {}, {} winners, purchase until {}, reveal until {}",
            id,
            lottery.ticket_count,
            lottery.ticket_price,
            lottery.num_winners,
            lottery.times.purchase_ends_at,
            lottery.times.reveal_ends_at
        );
        Ok(id)
    }

    fn lottery_info(&self, id: LotteryId) -> Result<LotteryInfo> {
        Ok(self.load_lottery(id)?.info())
    }

    fn lottery_url(&self, id: LotteryId) -> Result<LotteryMetadata> {
        Ok(self.load_lottery(id)?.metadata)
    }

    fn lottery_sales(&self, id: LotteryId) -> Result<u64> {
        Ok(self.load_lottery(id)?.tickets_sold)
    }

    fn current_lottery_no(&self) -> Result<u64> {
        self.store().lottery_count()
    }

    fn lottery_phase_times(&self, id: LotteryId) -> Result<PhaseTimes> {
        Ok(self.load_lottery(id)?.times)
    }

    fn lottery_state(&self, id: LotteryId) -> Result<LotteryState> {
        Ok(self.load_lottery(id)?.state)
    }

    fn lottery_payment_token(&self, id: LotteryId) -> Result<Option<Address>> {
        let lottery = self.load_lottery(id)?;
        self.settlement_token_address(&lottery)
    }

    fn lottery_ids(&self) -> Result<Vec<LotteryId>> {
        Ok((1..=self.store().lottery_count()?).collect())
    }

    fn lottery(&self, id: LotteryId) -> Result<Lottery> {
        self.load_lottery(id)
    }
}
