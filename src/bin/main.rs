// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bank_ledger_rs::{Ledger, NotifierHandle, OwnerId, TracingNotifier};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Bank Ledger - Process banking operation CSV files
///
/// Reads deposits, withdrawals, and transfers from a CSV file, runs them
/// through the ledger engine, and outputs final account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "A retail-banking ledger engine that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,owner,recipient,amount
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Optional CSV of owner contact registrations (owner,email,phone)
    ///
    /// Loaded before the operations so transfers can address recipients
    /// by email and notifications can be delivered.
    #[arg(long, value_name = "FILE")]
    contacts: Option<PathBuf>,
}

fn main() {
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    // Notifications are delivered by a background worker; the CLI build
    // logs them instead of calling a real provider.
    let notifier = NotifierHandle::spawn(Arc::new(TracingNotifier));
    let ledger = Ledger::with_notifier(notifier.sender());

    if let Some(path) = &args.contacts {
        if let Err(e) = open_and(path, |reader| load_contacts(reader, &ledger)) {
            eprintln!("Error loading contacts '{}': {}", path.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = open_and(&args.input, |reader| process_operations(reader, &ledger)) {
        eprintln!("Error processing operations '{}': {}", args.input.display(), e);
        process::exit(1);
    }

    // Write results to stdout
    if let Err(e) = write_accounts(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    drop(ledger);
    notifier.close();
}

/// Initialize tracing from RUST_LOG, defaulting to info.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_and<F>(path: &PathBuf, f: F) -> Result<(), csv::Error>
where
    F: FnOnce(BufReader<File>) -> Result<(), csv::Error>,
{
    let file = File::open(path)?;
    f(BufReader::new(file))
}

/// Raw CSV record matching the operations input format.
///
/// Fields: `op, owner, recipient, amount`
#[derive(Debug, Deserialize)]
struct OperationRecord {
    op: String,
    owner: String,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    amount: Option<Decimal>,
}

/// Raw CSV record for contact registrations.
///
/// Fields: `owner, email, phone`
#[derive(Debug, Deserialize)]
struct ContactRecord {
    owner: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
}

/// Load owner contact registrations from a CSV reader.
pub fn load_contacts<R: Read>(reader: R, ledger: &Ledger) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<ContactRecord>() {
        match result {
            Ok(record) => {
                ledger.register_owner(OwnerId::new(record.owner), record.email, record.phone);
            }
            Err(e) => {
                tracing::warn!("skipping malformed contact row: {}", e);
                continue;
            }
        }
    }

    Ok(())
}

/// Process banking operations from a CSV reader.
///
/// Streams rows so arbitrarily large files never load fully into memory.
/// Malformed rows and rejected operations are logged and skipped; the run
/// continues.
///
/// # CSV Format
///
/// Expected columns: `op, owner, recipient, amount`
/// - `op`: Operation (deposit, withdraw, transfer)
/// - `owner`: Owner identifier of the acting account
/// - `recipient`: Transfer target - account id or contact email (transfers only)
/// - `amount`: Decimal amount
///
/// # Example
///
/// ```csv
/// op,owner,recipient,amount
/// deposit,alice,,100.00
/// withdraw,alice,,25.00
/// transfer,alice,bob@example.com,50.00
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is
/// invalid. Individual operation rejections don't stop processing.
pub fn process_operations<R: Read>(reader: R, ledger: &Ledger) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " deposit "
        .flexible(true) // Allow missing recipient field
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<OperationRecord>() {
        match result {
            Ok(record) => {
                if let Err(e) = apply_operation(record, ledger) {
                    tracing::warn!("skipping operation: {}", e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                tracing::warn!("skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(())
}

fn apply_operation(record: OperationRecord, ledger: &Ledger) -> Result<(), String> {
    let owner = OwnerId::new(record.owner.clone());
    let amount = record
        .amount
        .ok_or_else(|| format!("missing amount for {} by {}", record.op, record.owner))?;

    let outcome = match record.op.to_lowercase().as_str() {
        "deposit" => ledger.deposit(&owner, amount),
        "withdraw" | "withdrawal" => ledger.withdraw(&owner, amount),
        "transfer" => {
            let recipient = record
                .recipient
                .filter(|r| !r.is_empty())
                .ok_or_else(|| format!("missing recipient for transfer by {}", record.owner))?;
            ledger.transfer(&owner, &recipient, amount)
        }
        other => return Err(format!("unknown operation '{}'", other)),
    };

    outcome
        .map(|_| ())
        .map_err(|e| format!("{} by {} rejected: {}", record.op, record.owner, e))
}

/// Write account states to a CSV writer
///
/// Outputs all accounts in CSV format with balances rounded to 2 decimal
/// places.
///
/// # CSV Format
///
/// Columns: `account_id, owner, balance, created_at`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    // Get all account snapshots and serialize each one
    for account in ledger.accounts().iter() {
        wtr.serialize(account.value().snapshot())?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
