//! Operator CLI for the card marketplace ledger.
//!
//! Runs migrations, inspects wallets and drives the administrative ledger
//! operations (withdraw approval, balance adjustment) as a configured admin
//! account.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Error, bail};
use card_ledger::{
    auth::{Actor, Role, load_actor},
    db::Database,
    referral::ReferralManager,
    wallet::WalletManager,
    withdraw::{WithdrawManager, WithdrawStatus},
};
use config::AdminConfig;
use log::{info, warn};
use pico_args::Arguments;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const HELP: &str = "\
Operate the card marketplace ledger

USAGE:
  ledger_admin [OPTIONS] <COMMAND>

COMMANDS:
  migrate                               Apply pending schema migrations
  wallet     <USER_ID>                  Show wallet, recent transactions and open withdraws
  history    <USER_ID> [--limit N]      Show a user's transactions  [default limit: 50]
  referrals  <USER_ID>                  Show a user's referral code and referred users
  withdraws  [--status S] [--page N] [--per-page N]
                                        List withdraw requests, oldest first
  approve    <REQUEST_ID>               Approve a pending withdraw request
  reject     <REQUEST_ID> [--reason R]  Reject a pending withdraw request and refund it
  adjust     <USER_ID> <AMOUNT> [--reason R]
                                        Credit (positive) or debit (negative) a wallet

OPTIONS:
  --db-url   URL                        Database connection string  [default: env DATABASE_URL]
  --as       USER_ID                    Acting admin account  [default: env LEDGER_ADMIN_USER_ID]

FLAGS:
  -v, --verbose                         Debug logging
  -h, --help                            Print help information

ENVIRONMENT:
  DATABASE_URL                          PostgreSQL connection string
  LEDGER_ADMIN_USER_ID                  Id of the admin account the CLI acts as
  RUST_LOG                              Log filter (e.g. info,sqlx=warn)
  (See .env.example for the ledger policy variables)
";

/// Global options shared by every command
#[derive(Debug, Default, PartialEq)]
struct GlobalArgs {
    database_url: Option<String>,
    acting_user: Option<i64>,
    verbose: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Migrate,
    Wallet {
        user_id: i64,
    },
    History {
        user_id: i64,
        limit: i64,
    },
    Referrals {
        user_id: i64,
    },
    Withdraws {
        status: Option<WithdrawStatus>,
        page: i64,
        per_page: i64,
    },
    Approve {
        request_id: Uuid,
    },
    Reject {
        request_id: Uuid,
        reason: Option<String>,
    },
    Adjust {
        user_id: i64,
        amount: Decimal,
        reason: String,
    },
}

impl Command {
    /// Whether the command runs a privileged ledger operation
    fn needs_actor(&self) -> bool {
        matches!(
            self,
            Command::Withdraws { .. }
                | Command::Approve { .. }
                | Command::Reject { .. }
                | Command::Adjust { .. }
        )
    }
}

fn parse_args(mut pargs: Arguments) -> Result<(GlobalArgs, Command), Error> {
    let global = GlobalArgs {
        database_url: pargs.opt_value_from_str("--db-url")?,
        acting_user: pargs.opt_value_from_str("--as")?,
        verbose: pargs.contains(["-v", "--verbose"]),
    };

    let Some(name) = pargs.subcommand()? else {
        bail!("Missing command, see --help");
    };

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "wallet" => Command::Wallet {
            user_id: pargs.free_from_str()?,
        },
        "history" => {
            let limit = pargs
                .opt_value_from_str("--limit")?
                .unwrap_or(card_ledger::wallet::DEFAULT_HISTORY_LIMIT);
            Command::History {
                user_id: pargs.free_from_str()?,
                limit,
            }
        }
        "referrals" => Command::Referrals {
            user_id: pargs.free_from_str()?,
        },
        "withdraws" => Command::Withdraws {
            status: pargs.opt_value_from_str("--status")?,
            page: pargs.opt_value_from_str("--page")?.unwrap_or(1),
            per_page: pargs.opt_value_from_str("--per-page")?.unwrap_or(20),
        },
        "approve" => Command::Approve {
            request_id: pargs.free_from_str()?,
        },
        "reject" => {
            let reason = pargs.opt_value_from_str("--reason")?;
            Command::Reject {
                request_id: pargs.free_from_str()?,
                reason,
            }
        }
        "adjust" => {
            let reason: Option<String> = pargs.opt_value_from_str("--reason")?;
            let user_id = pargs.free_from_str()?;
            let amount = pargs.free_from_str()?;
            Command::Adjust {
                user_id,
                amount,
                reason: reason.unwrap_or_else(|| "Manual adjustment".to_string()),
            }
        }
        other => bail!("Unknown command: {other}"),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        bail!("Unexpected arguments: {remaining:?}");
    }

    Ok((global, command))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let (global, command) = parse_args(pargs)?;
    logging::init(global.verbose);

    let config = AdminConfig::from_env(global.database_url, global.acting_user)
        .context("Invalid configuration")?;

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    if command == Command::Migrate {
        db.migrate().await.context("Migration failed")?;
        info!("Migrations applied");
        return Ok(());
    }

    let pool = Arc::new(db.pool().clone());
    let ledger_config = Arc::new(config.ledger.clone());

    let actor = if command.needs_actor() {
        Some(acting_admin(&pool, config.acting_user_id()?).await?)
    } else {
        None
    };

    let wallets = WalletManager::new(pool.clone(), ledger_config.clone());
    let withdraws = WithdrawManager::new(pool.clone(), ledger_config.clone());
    let referrals = ReferralManager::new(pool.clone(), ledger_config.clone());

    let output = match (command, actor) {
        (Command::Wallet { user_id }, _) => json!(wallets.get_wallet_summary(user_id).await?),
        (Command::History { user_id, limit }, _) => {
            json!(wallets.get_transactions(user_id, limit).await?)
        }
        (Command::Referrals { user_id }, _) => {
            json!(referrals.get_referral_info(user_id).await?)
        }
        (
            Command::Withdraws {
                status,
                page,
                per_page,
            },
            Some(actor),
        ) => json!(withdraws.list_withdraws(&actor, status, page, per_page).await?),
        (Command::Approve { request_id }, Some(actor)) => {
            let request = withdraws.approve(&actor, request_id).await?;
            logging::log_admin_action(actor.user_id, "approve", &format!("withdraw {request_id}"));
            json!(request)
        }
        (Command::Reject { request_id, reason }, Some(actor)) => {
            let request = withdraws
                .reject(&actor, request_id, reason.as_deref())
                .await?;
            logging::log_admin_action(actor.user_id, "reject", &format!("withdraw {request_id}"));
            json!(request)
        }
        (
            Command::Adjust {
                user_id,
                amount,
                reason,
            },
            Some(actor),
        ) => {
            let entry = wallets
                .adjust_balance(&actor, user_id, amount, &reason)
                .await?;
            logging::log_admin_action(
                actor.user_id,
                "adjust",
                &format!("wallet of user {user_id} by {amount}"),
            );
            json!(entry)
        }
        (command, _) => bail!("Command {command:?} cannot run without an acting admin"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    db.close().await;
    Ok(())
}

/// Load the configured admin and check they hold an admin role
async fn acting_admin(pool: &PgPool, user_id: i64) -> Result<Actor, Error> {
    let actor = load_actor(pool, user_id)
        .await
        .with_context(|| format!("Cannot load acting user {user_id}"))?;

    if actor.role == Role::User {
        warn!("Acting user {} has no admin role", user_id);
    }

    Ok(actor)
}
