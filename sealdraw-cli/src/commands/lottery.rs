use super::{format_time, Context};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use sealdraw_core::{Amount, Digest, LotteryId, Timestamp};
use sealdraw_lottery::{
    Escrow, LotteryParams, LotteryRegistry, LotteryState, Phase, WinnerSelection,
};

#[derive(Subcommand)]
pub enum LotteryCommands {
    /// Create a lottery (owner only)
    Create {
        /// Number of tickets for sale
        #[arg(long)]
        tickets: u64,
        /// Number of winning tickets
        #[arg(long)]
        winners: u64,
        /// Share of tickets (1-100) that must sell for the lottery to draw
        #[arg(long)]
        min_percentage: u32,
        /// Price per ticket in payment token units
        #[arg(long)]
        price: Amount,
        /// Seconds until the reveal window closes. Purchases take the first half
        #[arg(long, default_value_t = 3_600, conflicts_with = "end")]
        duration: i64,
        /// Unix time the reveal window closes
        #[arg(long)]
        end: Option<Timestamp>,
        /// Link to the lottery description
        #[arg(long, default_value = "")]
        url: String,
        /// Hash of the description, 0x + 64 hex chars. Defaults to the hash of the url
        #[arg(long)]
        metadata_hash: Option<Digest>,
    },
    /// List all lotteries
    List,
    /// Show one lottery in detail
    Show {
        /// Lottery number
        id: LotteryId,
    },
    /// Settle a lottery after its reveal window
    Finalize {
        /// Lottery number
        id: LotteryId,
    },
    /// Show the winning tickets
    Winners {
        /// Lottery number
        id: LotteryId,
    },
    /// Collect ticket proceeds (owner only)
    WithdrawProceeds {
        /// Lottery number
        id: LotteryId,
    },
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Purchase => "purchase",
        Phase::Sealed => "purchase closed",
        Phase::Reveal => "reveal",
        Phase::Ended => "ended",
    }
}

pub async fn handle_lottery_command(cmd: LotteryCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        LotteryCommands::Create {
            tickets,
            winners,
            min_percentage,
            price,
            duration,
            end,
            url,
            metadata_hash,
        } => {
            let end_time = end.unwrap_or_else(|| ctx.engine.now() + duration);
            let metadata_hash = metadata_hash.unwrap_or_else(|| Digest::sha256(&[url.as_bytes()]));
            let params = LotteryParams::new(end_time, tickets, winners, min_percentage, price)
                .with_metadata(metadata_hash, url);

            let id = ctx.engine.create_lottery(ctx.caller, params)?;
            let times = ctx.engine.lottery_phase_times(id)?;

            println!("Created lottery #{}", id);
            println!("  Purchases until: {}", format_time(times.purchase_ends_at));
            println!("  Reveals until:   {}", format_time(times.reveal_ends_at));
        }

        LotteryCommands::List => {
            let ids = ctx.engine.lottery_ids()?;
            if ids.is_empty() {
                println!("No lotteries found.");
                println!("Create one with: sealdraw lottery create --tickets <n> --winners <n> --min-percentage <p> --price <amount>");
                return Ok(());
            }

            let now = ctx.engine.now();
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["#", "State", "Phase", "Sold", "Price", "Winners", "Ends"]);

            for id in ids {
                let lottery = ctx.engine.lottery(id)?;
                table.add_row(vec![
                    id.to_string(),
                    lottery.state.to_string(),
                    phase_label(lottery.phase_at(now)).to_string(),
                    format!("{}/{}", lottery.tickets_sold, lottery.ticket_count),
                    lottery.ticket_price.to_string(),
                    lottery.num_winners.to_string(),
                    format_time(lottery.times.reveal_ends_at),
                ]);
            }

            println!("{table}");
        }

        LotteryCommands::Show { id } => {
            let lottery = ctx.engine.lottery(id)?;
            let now = ctx.engine.now();

            println!("Lottery #{}", id);
            println!("  State: {}", lottery.state);
            println!("  Phase: {}", phase_label(lottery.phase_at(now)));
            println!("  Created: {}", format_time(lottery.times.created_at));
            println!("  Purchases until: {}", format_time(lottery.times.purchase_ends_at));
            println!("  Reveals until: {}", format_time(lottery.times.reveal_ends_at));
            println!(
                "  Tickets: {} sold of {} ({} remaining)",
                lottery.tickets_sold,
                lottery.ticket_count,
                lottery.remaining_tickets()
            );
            println!(
                "  Winners: {}, needs {}% sold",
                lottery.num_winners, lottery.min_percentage
            );
            println!("  Price: {}", lottery.ticket_price);
            if let Some(token) = ctx.engine.lottery_payment_token(id)? {
                println!("  Payment token: {}", token);
            }
            if !lottery.metadata.url.is_empty() {
                println!("  URL: {}", lottery.metadata.url);
            }
            println!("  Metadata hash: {}", lottery.metadata.hash);

            if lottery.purchases.is_empty() {
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Tickets", "Buyer", "Revealed", "Refunded"]);
            for record in &lottery.purchases {
                table.add_row(vec![
                    format!("{}-{}", record.start_ticket, record.end_ticket()),
                    record.buyer.short(),
                    if record.is_revealed() { "yes" } else { "no" }.to_string(),
                    if record.refund_withdrawn { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{table}");
        }

        LotteryCommands::Finalize { id } => {
            match ctx.engine.finalize_lottery(ctx.caller, id)? {
                LotteryState::Finalized => {
                    let winners = ctx.engine.lottery(id)?.winning_tickets;
                    println!("Lottery #{} finalized", id);
                    println!("  Winning tickets: {:?}", winners);
                }
                _ => {
                    println!("Lottery #{} canceled: not enough tickets sold", id);
                    println!("  Buyers can claim refunds with: sealdraw ticket refund {} <start>", id);
                }
            }
        }

        LotteryCommands::Winners { id } => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Draw", "Ticket", "Holder"]);

            let lottery = ctx.engine.lottery(id)?;
            // asking for draw 1 reports why an unsettled lottery has no winners
            for index in 1..=lottery.winning_tickets.len().max(1) {
                let ticket = ctx.engine.ith_winning_ticket(id, index)?;
                let holder = lottery
                    .record_covering(ticket)
                    .map(|record| record.buyer.short())
                    .unwrap_or_default();
                table.add_row(vec![index.to_string(), ticket.to_string(), holder]);
            }
            println!("{table}");
        }

        LotteryCommands::WithdrawProceeds { id } => {
            let amount = ctx.engine.withdraw_ticket_proceeds(ctx.caller, id)?;
            let position = ctx.engine.escrow_position(id)?;
            println!("Withdrew {} from lottery #{}", amount, id);
            println!(
                "  Collected: {}, refunded: {}, left in custody: {}",
                position.collected,
                position.refunds_paid,
                position.outstanding()
            );
        }
    }

    Ok(())
}
