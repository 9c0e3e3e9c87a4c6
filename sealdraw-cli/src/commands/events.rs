use super::{format_time, Context};
use comfy_table::{presets::UTF8_FULL, Table};
use sealdraw_core::LotteryId;
use sealdraw_lottery::LotteryEvent;

fn describe(event: &LotteryEvent) -> String {
    match event {
        LotteryEvent::LotteryCreated { .. } => String::new(),
        LotteryEvent::TicketPurchased {
            buyer,
            start_ticket,
            quantity,
            ..
        } => format!("{} bought {} from #{}", buyer.short(), quantity, start_ticket),
        LotteryEvent::RandomNumberRevealed { start_ticket, .. } => {
            format!("tickets from #{}", start_ticket)
        }
        LotteryEvent::LotteryFinalized {
            winning_tickets, ..
        } => format!("winners {:?}", winning_tickets),
        LotteryEvent::LotteryCanceled { .. } => String::new(),
        LotteryEvent::ProceedsWithdrawn { amount, owner, .. } => {
            format!("{} to {}", amount, owner.short())
        }
        LotteryEvent::TicketRefundWithdrawn {
            start_ticket,
            buyer,
            amount,
            ..
        } => format!("{} to {} for #{}", amount, buyer.short(), start_ticket),
        LotteryEvent::PaymentTokenUpdated { old, new } | LotteryEvent::OwnerUpdated { old, new } => {
            format!("{} -> {}", old.short(), new.short())
        }
    }
}

pub async fn handle_events_command(
    ctx: &Context,
    since: u64,
    lottery: Option<LotteryId>,
    json: bool,
) -> anyhow::Result<()> {
    let records: Vec<_> = ctx
        .engine
        .events_since(since)?
        .into_iter()
        .filter(|record| lottery.is_none() || record.event.lottery_id() == lottery)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No events.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Seq", "Time", "Event", "Lottery", "Details"]);
    for record in &records {
        table.add_row(vec![
            record.seq.to_string(),
            format_time(record.at),
            record.event.kind().to_string(),
            record
                .event
                .lottery_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            describe(&record.event),
        ]);
    }
    println!("{table}");

    Ok(())
}
