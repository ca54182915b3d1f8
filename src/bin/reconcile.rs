use std::{error::Error, process::exit};

use clap::Parser;

use expense_tracker::{StoreArgs, UserID, find_drift, logging::init_logging, reconcile};

/// Check that the cached wallet and budget balances of a user match their
/// transactions, and optionally repair the ones that do not.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    store: StoreArgs,

    /// The ID of the user whose balances are checked.
    #[arg(long)]
    user_id: i64,

    /// Overwrite drifted balances with the sum of their transactions.
    #[arg(long)]
    repair: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let args = Args::parse();
    let store = args.store.open_store()?;
    let user_id = UserID::new(args.user_id);

    let drift = if args.repair {
        reconcile(&store, user_id)?
    } else {
        find_drift(&store, user_id)?
    };

    if drift.is_empty() {
        println!("All balances of user {user_id} are consistent.");
        return Ok(());
    }

    for entry in &drift {
        println!(
            "{:?} {}: cached {} cents, transactions sum to {} cents",
            entry.kind, entry.id, entry.cached_in_cents, entry.actual_in_cents
        );
    }

    if args.repair {
        println!("Repaired {} balance(s).", drift.len());
    } else {
        eprintln!(
            "Found {} inconsistent balance(s). Run again with --repair to fix them.",
            drift.len()
        );
        exit(2);
    }

    Ok(())
}
