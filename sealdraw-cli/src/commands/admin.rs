use super::{parse_identity, Context};
use clap::Subcommand;
use dialoguer::Confirm;
use sealdraw_core::FungibleToken;
use sealdraw_lottery::AdminAuthority;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Show the owner and the payment token
    Show,
    /// Hand ownership to another identity
    SetOwner {
        /// New owner (label or 0x address)
        owner: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Set the token new purchases are paid in
    SetPaymentToken {
        /// Token symbol or address
        token: String,
    },
}

pub async fn handle_admin_command(cmd: AdminCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Show => {
            println!("Owner: {}", ctx.engine.owner()?);
            match ctx.engine.payment_token()? {
                Some(address) => {
                    let symbol = ctx
                        .ledger(&address.to_string())
                        .map(|ledger| ledger.symbol())
                        .unwrap_or_else(|_| "?".to_string());
                    println!("Payment token: {} ({})", symbol, address);
                }
                None => {
                    println!("Payment token: not set");
                    println!("Set one with: sealdraw admin set-payment-token <symbol>");
                }
            }
            println!("Custody account: {}", ctx.engine.custody());
            println!("You are: {}", ctx.caller);
        }

        AdminCommands::SetOwner { owner, yes } => {
            let new_owner = parse_identity(&owner)?;

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Transfer ownership to {}? You will lose owner rights",
                        new_owner
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Ownership transfer cancelled.");
                    return Ok(());
                }
            }

            ctx.engine.set_owner(ctx.caller, new_owner)?;
            println!("Ownership transferred to {}", new_owner);
        }

        AdminCommands::SetPaymentToken { token } => {
            // unknown symbols still go through, as an address
            let address = match ctx.ledger(&token) {
                Ok(ledger) => ledger.address(),
                Err(_) => parse_identity(&token)?,
            };

            ctx.engine.set_payment_token(ctx.caller, address)?;
            println!("Payment token set to {}", address);
        }
    }

    Ok(())
}
