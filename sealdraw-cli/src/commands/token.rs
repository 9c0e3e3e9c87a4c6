use super::{parse_identity, Context};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use sealdraw_core::{Amount, FungibleToken};
use sealdraw_lottery::AdminAuthority;

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create a local token ledger
    Deploy {
        /// Token symbol
        symbol: String,
    },
    /// Create tokens out of thin air
    Mint {
        /// Token symbol or address
        token: String,
        /// Receiving identity
        to: String,
        /// Amount in token units
        amount: Amount,
    },
    /// Allow the engine to collect ticket payments from you
    Approve {
        /// Token symbol or address
        token: String,
        /// Allowance in token units
        amount: Amount,
    },
    /// Show a balance
    Balance {
        /// Token symbol or address
        token: String,
        /// Identity to inspect, defaults to you
        account: Option<String>,
    },
    /// List local tokens
    List,
    /// Make every transfer of a token fail, or stop doing so
    FailTransfers {
        /// Token symbol or address
        token: String,
        /// true or false
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

pub async fn handle_token_command(cmd: TokenCommands, ctx: &mut Context) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Deploy { symbol } => {
            let token = ctx.deploy_token(&symbol)?;
            println!("Deployed {} at {}", symbol, token.address());
        }

        TokenCommands::Mint { token, to, amount } => {
            let ledger = ctx.ledger(&token)?;
            let to = parse_identity(&to)?;
            let balance = ledger.mint(to, amount)?;
            println!("Minted {} {} to {}", amount, ledger.symbol(), to);
            println!("  New balance: {}", balance);
        }

        TokenCommands::Approve { token, amount } => {
            let ledger = ctx.ledger(&token)?;
            let custody = ctx.engine.custody();
            ledger.approve(ctx.caller, custody, amount);
            println!(
                "Approved {} {} for the lottery engine ({})",
                amount,
                ledger.symbol(),
                custody
            );
        }

        TokenCommands::Balance { token, account } => {
            let ledger = ctx.ledger(&token)?;
            let account = match account {
                Some(account) => parse_identity(&account)?,
                None => ctx.caller,
            };
            let custody = ctx.engine.custody();

            println!("Balance of {}: {} {}", account, ledger.balance_of(account), ledger.symbol());
            println!(
                "  Allowance for the engine: {}",
                ledger.allowance(account, custody)
            );
        }

        TokenCommands::List => {
            let custody = ctx.engine.custody();
            let payment_token = ctx.engine.payment_token()?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Symbol", "Address", "Supply", "In custody", "Payment"]);

            let mut count = 0;
            for ledger in ctx.ledgers() {
                count += 1;
                table.add_row(vec![
                    ledger.symbol(),
                    ledger.address().to_string(),
                    ledger.total_supply().to_string(),
                    ledger.balance_of(custody).to_string(),
                    if payment_token == Some(ledger.address()) {
                        "yes".to_string()
                    } else {
                        String::new()
                    },
                ]);
            }

            if count == 0 {
                println!("No tokens found.");
                println!("Deploy one with: sealdraw token deploy <symbol>");
                return Ok(());
            }
            println!("{table}");
        }

        TokenCommands::FailTransfers { token, enabled } => {
            let ledger = ctx.ledger(&token)?;
            ledger.set_fail_transfers(enabled);
            if enabled {
                println!("Transfers of {} will now fail", ledger.symbol());
            } else {
                println!("Transfers of {} work again", ledger.symbol());
            }
        }
    }

    ctx.save_tokens()
}
