use std::{error::Error, path::PathBuf, process::exit};

use clap::Parser;
use time::{Duration, OffsetDateTime};

use expense_tracker::{
    BudgetService, LedgerStore, PasswordHash, Store, Transaction, TransactionService, TransactionType,
    ValidatedPassword, WalletService, logging::init_logging, stores::SqliteStore,
};

/// Create a SQLite database with a demo user, budget, wallet and transactions for manual testing.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: PathBuf,
}

const TRANSACTION_COUNT: i64 = 21;

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let args = Args::parse();
    let output_path = args.output_path.as_path();

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let store: Store = SqliteStore::open(output_path)?.into();

    println!("Creating demo user...");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("demo"),
        PasswordHash::DEFAULT_COST,
    )?;
    let user = store.write(|ledger| ledger.insert_user("demo", &password_hash))?;

    println!("Creating budget and wallet...");
    let budget = BudgetService::new(store.clone()).create_budget(user.id, "Demo Budget", 500)?;
    let wallet = WalletService::new(store.clone()).create_wallet(user.id, "Demo Cash Wallet")?;

    println!("Creating {TRANSACTION_COUNT} transactions...");
    let transactions = TransactionService::new(store);
    let now = OffsetDateTime::now_utc();

    for i in 0..TRANSACTION_COUNT {
        let transaction_type = if i % 4 == 0 {
            TransactionType::Expense
        } else {
            TransactionType::Income
        };

        transactions.create_transaction(
            user.id,
            Transaction::build(
                104 * (i + 1),
                transaction_type,
                wallet.id,
                &format!("Transaction{}{}", i % 2, i % 3),
            )
            .date(now - Duration::days(i))
            .budget_id(Some(budget.id)),
        )?;
    }

    println!("Success! Log in as \"demo\" with the password \"demo\".");

    Ok(())
}
