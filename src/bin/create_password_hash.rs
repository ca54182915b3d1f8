use std::{io, process::exit};

use clap::Parser;

use expense_tracker::{PasswordHash, ValidatedPassword, logging::init_logging};

/// Prompt for a password and print its bcrypt hash, e.g. for seeding a user by hand.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The bcrypt cost, from 4 to 31.
    #[arg(long, default_value_t = PasswordHash::DEFAULT_COST)]
    cost: u32,
}

fn main() {
    init_logging();

    let args = Args::parse();

    let Some(password_hash) = get_new_password_hash(args.cost) else {
        exit(1);
    };

    println!("{password_hash}");
}

fn get_new_password_hash(cost: u32) -> Option<PasswordHash> {
    loop {
        let first_password = prompt("Enter a password: ")?;

        let validated_password = match ValidatedPassword::new(&first_password) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = prompt("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, cost) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}."));
                return None;
            }
        }
    }
}

/// Read a password without echoing it. Returns `None` on end of input.
fn prompt(message: &str) -> Option<String> {
    match rpassword::prompt_password(message) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    );
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
