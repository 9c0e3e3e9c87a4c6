use super::{format_time, Context};
use anyhow::{anyhow, Context as _};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use sealdraw_core::{Address, LotteryId};
use sealdraw_lottery::{
    commit, generate_secret, Escrow, LotteryRegistry, LotteryState, Secret, TicketSales,
    WinnerSelection,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SECRETS_FILE: &str = "secrets.json";

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Buy consecutive tickets, sealed by a secret
    Buy {
        /// Lottery number
        lottery: LotteryId,
        /// Number of tickets
        quantity: u32,
        /// Secret to commit to (decimal or 0x hex). Random if omitted
        #[arg(long)]
        secret: Option<Secret>,
    },
    /// Reveal the secret of a purchase
    Reveal {
        /// Lottery number
        lottery: LotteryId,
        /// First ticket of the purchase
        start: u64,
        /// Tickets in the purchase, if not remembered locally
        #[arg(long)]
        quantity: Option<u32>,
        /// Secret, if not remembered locally
        #[arg(long)]
        secret: Option<Secret>,
    },
    /// List your purchases in a lottery
    List {
        /// Lottery number
        lottery: LotteryId,
    },
    /// Check whether one of your tickets won
    Check {
        /// Lottery number
        lottery: LotteryId,
        /// Ticket number
        ticket: u64,
    },
    /// Claim the refund of a purchase in a canceled lottery
    Refund {
        /// Lottery number
        lottery: LotteryId,
        /// First ticket of the purchase
        start: u64,
    },
}

/// Secrets of local purchases, kept until they are revealed.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretBook {
    entries: Vec<SecretEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretEntry {
    lottery_id: LotteryId,
    buyer: Address,
    start_ticket: u64,
    quantity: u32,
    secret: Secret,
    created_at: i64,
}

impl SecretBook {
    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SECRETS_FILE)
    }

    async fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    async fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(Self::path(data_dir), content).await?;
        Ok(())
    }

    fn find(&self, lottery_id: LotteryId, buyer: Address, start: u64) -> Option<&SecretEntry> {
        self.entries.iter().find(|entry| {
            entry.lottery_id == lottery_id && entry.buyer == buyer && entry.start_ticket == start
        })
    }
}

pub async fn handle_ticket_command(cmd: TicketCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        TicketCommands::Buy {
            lottery,
            quantity,
            secret,
        } => {
            let secret = secret.unwrap_or_else(generate_secret);
            let start = ctx
                .engine
                .buy_tickets(ctx.caller, lottery, quantity, commit(&secret))?;

            let mut book = SecretBook::load(&ctx.data_dir).await?;
            book.entries.push(SecretEntry {
                lottery_id: lottery,
                buyer: ctx.caller,
                start_ticket: start,
                quantity,
                secret,
                created_at: ctx.engine.now(),
            });
            book.save(&ctx.data_dir).await?;

            let times = ctx.engine.lottery(lottery)?.times;
            println!(
                "Bought tickets {}-{} in lottery #{}",
                start,
                start + u64::from(quantity) - 1,
                lottery
            );
            println!("  Secret: {}", secret);
            println!("  Keep it! Reveal after {} with:", format_time(times.purchase_ends_at));
            println!("  sealdraw ticket reveal {} {}", lottery, start);
        }

        TicketCommands::Reveal {
            lottery,
            start,
            quantity,
            secret,
        } => {
            let book = SecretBook::load(&ctx.data_dir).await?;
            let remembered = book.find(lottery, ctx.caller, start);

            let secret = secret
                .or_else(|| remembered.map(|entry| entry.secret))
                .ok_or_else(|| {
                    anyhow!("no stored secret for tickets starting at {}, pass --secret", start)
                })?;
            let quantity = quantity
                .or_else(|| remembered.map(|entry| entry.quantity))
                .ok_or_else(|| anyhow!("pass --quantity for tickets starting at {}", start))?;

            ctx.engine
                .reveal_secret(ctx.caller, lottery, start, quantity, secret)?;
            println!("Revealed tickets starting at {} in lottery #{}", start, lottery);
        }

        TicketCommands::List { lottery } => {
            let records = ctx.engine.tickets_of(lottery, ctx.caller)?;
            if records.is_empty() {
                println!("You have no tickets in lottery #{}.", lottery);
                return Ok(());
            }

            let state = ctx.engine.lottery(lottery)?.state;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Tickets", "Quantity", "Revealed", "Won", "Refunded"]);

            for record in records {
                let won = match state {
                    LotteryState::Finalized => {
                        let mut won = Vec::new();
                        for ticket in record.range() {
                            if ctx.engine.check_if_my_ticket_won(ctx.caller, lottery, ticket)? {
                                won.push(ticket.to_string());
                            }
                        }
                        won.join(", ")
                    }
                    _ => String::new(),
                };
                table.add_row(vec![
                    format!("{}-{}", record.start_ticket, record.end_ticket()),
                    record.quantity.to_string(),
                    if record.is_revealed() { "yes" } else { "no" }.to_string(),
                    won,
                    if record.refund_withdrawn { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{table}");
        }

        TicketCommands::Check { lottery, ticket } => {
            if ctx.engine.check_if_my_ticket_won(ctx.caller, lottery, ticket)? {
                println!("Ticket {} won in lottery #{}!", ticket, lottery);
            } else {
                println!("Ticket {} did not win in lottery #{}.", ticket, lottery);
            }
        }

        TicketCommands::Refund { lottery, start } => {
            let amount = ctx.engine.withdraw_ticket_refund(ctx.caller, lottery, start)?;
            println!(
                "Refunded {} for tickets starting at {} in lottery #{}",
                amount, start, lottery
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_secret_book_round_trip() {
        let dir = tempdir().unwrap();
        let alice = Address::from_label("alice");

        let mut book = SecretBook::load(dir.path()).await.unwrap();
        assert!(book.entries.is_empty());
        book.entries.push(SecretEntry {
            lottery_id: 1,
            buyer: alice,
            start_ticket: 6,
            quantity: 3,
            secret: Secret::from(99u64),
            created_at: 0,
        });
        book.save(dir.path()).await.unwrap();

        let book = SecretBook::load(dir.path()).await.unwrap();
        let entry = book.find(1, alice, 6).unwrap();
        assert_eq!(entry.secret, Secret::from(99u64));
        assert!(book.find(1, alice, 1).is_none());
        assert!(book.find(2, alice, 6).is_none());
    }
}
