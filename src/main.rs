//! settlement-engine CLI
//!
//! Compute and apply group settlements from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show who should pay whom
//! settlement-engine preview --input group.json
//!
//! # Apply the settlement and write the updated group back out
//! settlement-engine settle --input group.json --output settled.json
//!
//! # Per-attendee net positions, as JSON
//! settlement-engine balances --input group.json --format json
//!
//! # Generate a random group for testing
//! settlement-engine generate --attendees 10 --expenses 40
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use settlement_engine::balance::shares::resolve_shares;
use settlement_engine::config::EngineConfig;
use settlement_engine::core::attendee::GroupId;
use settlement_engine::error::EngineError;
use settlement_engine::execution::memory::{GroupRecord, InMemoryStore};
use settlement_engine::service::SettlementService;
use settlement_engine::simulation::generator::{generate_group, generate_group_with, GroupConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"settlement-engine: group expense balances and minimal settlements

USAGE:
    settlement-engine <COMMAND> [OPTIONS]

COMMANDS:
    preview     Show the suggested settlement payments
    settle      Apply the settlement (creates payments, closes expenses)
    balances    Show what each attendee paid, owes and nets
    split       Show how each open expense is split
    generate    Generate a random group (for testing)
    help        Show this message

OPTIONS (preview, settle, balances, split):
    --input <FILE>      Path to JSON group file
    --format <FORMAT>   Output format: text (default) or json
    --config <FILE>     Path to JSON engine config

OPTIONS (settle):
    --output <FILE>     Write the updated group to a file

OPTIONS (generate):
    --attendees <N>     Number of attendees (default: 8)
    --expenses <N>      Number of expenses (default: 20)
    --payments <N>      Number of prior payments (default: 3)
    --seed <N>          Seed for a reproducible group
    --output <FILE>     Write to file instead of stdout

ENVIRONMENT:
    RUST_LOG            Log filter, e.g. RUST_LOG=settlement_engine=debug

EXAMPLES:
    settlement-engine preview --input group.json
    settlement-engine settle --input group.json --output settled.json
    settlement-engine balances --input group.json --format json
    settlement-engine generate --attendees 20 --expenses 60 --seed 7"#
    );
}

/// Options shared by the commands that read a group file.
struct GroupOptions {
    input: String,
    json: bool,
    config: EngineConfig,
    output: Option<String>,
}

fn parse_group_options(args: &[String], allow_output: bool) -> GroupOptions {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut config_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--config requires a file path");
                    process::exit(1);
                }));
            }
            "--output" if allow_output => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    if format != "text" && format != "json" {
        eprintln!("Unknown format '{}': expected 'text' or 'json'", format);
        process::exit(1);
    }

    let input = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let config = match config_path {
        Some(path) => EngineConfig::from_json_file(&path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    };

    GroupOptions {
        input,
        json: format == "json",
        config,
        output: output_path,
    }
}

fn load_group(path: &str) -> GroupRecord {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "attendees": [{{ "id": "alice", "name": "Alice" }}],
  "expenses": [
    {{ "id": "dinner", "payerId": "alice", "amountCents": 9000,
      "participants": [{{ "attendeeId": "alice", "optedIn": true }}] }}
  ],
  "payments": []
}}"#
        );
        process::exit(1);
    })
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

fn fail(err: EngineError) -> ! {
    eprintln!("Error ({}): {}", err.status_code(), err);
    if err.is_retryable() {
        eprintln!("The operation can be retried.");
    }
    process::exit(1);
}

/// The CLI works on one group per file.
fn cli_group() -> GroupId {
    GroupId::new("cli")
}

fn open_service(options: &GroupOptions) -> SettlementService<InMemoryStore> {
    let store = InMemoryStore::new().with_group(cli_group(), load_group(&options.input));
    SettlementService::new(store, &options.config)
}

fn cmd_preview(args: &[String]) {
    let options = parse_group_options(args, false);
    let service = open_service(&options);
    let view = service.preview(&cli_group()).unwrap_or_else(|e| fail(e));

    if options.json {
        println!("{}", to_json(&view));
        return;
    }

    println!("=== Suggested Settlements ===");
    if view.settlements.is_empty() {
        println!("Everyone is settled up.");
    }
    for entry in &view.settlements {
        println!("  {} pays {} {}", entry.from_name, entry.to_name, entry.amount_cents);
    }
    println!("\nDebts:    {}", view.original_count);
    println!("Payments: {}", view.optimized_count);
    println!("Savings:  {}%", view.savings_percent);

    if !view.overpayments.is_empty() {
        println!("\nOverpayments flagged for reconciliation:");
        for op in &view.overpayments {
            println!("  {} overpaid {} by {}", op.payer, op.payee, op.excess);
        }
    }
}

fn cmd_settle(args: &[String]) {
    let options = parse_group_options(args, true);
    let service = open_service(&options);
    let report = service.settle(&cli_group()).unwrap_or_else(|e| fail(e));

    if options.json {
        println!("{}", to_json(&report));
    } else {
        println!("=== Settlement Applied ===");
        for instruction in &report.instructions {
            println!("  {}", instruction.reason);
        }
        println!("\nPayments created:    {}", report.payments_created);
        println!("Expenses settled:    {}", report.expenses_settled);
        println!("Payments reconciled: {}", report.payments_reconciled);
        if !report.attributed_expenses.is_empty() {
            let ids: Vec<&str> = report.attributed_expenses.iter().map(|e| e.as_str()).collect();
            println!("Debts arose from:    {}", ids.join(", "));
        }
    }

    if let Some(path) = options.output {
        let record = service.store().group(&cli_group()).unwrap_or_default();
        fs::write(&path, to_json(&record)).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!("Updated group written to {}", path);
    }
}

fn cmd_balances(args: &[String]) {
    let options = parse_group_options(args, false);
    let service = open_service(&options);
    let balances = service.balances(&cli_group()).unwrap_or_else(|e| fail(e));

    if options.json {
        println!("{}", to_json(&balances));
        return;
    }

    println!("=== Net Positions ===");
    println!(
        "  {:<20} {:>12} {:>12} {:>12}",
        "attendee", "paid", "owed", "net"
    );
    for balance in &balances {
        let status = if balance.net_cents.is_positive() {
            "is owed"
        } else if balance.net_cents.is_negative() {
            "owes"
        } else {
            "settled"
        };
        println!(
            "  {:<20} {:>12} {:>12} {:>12}  {}",
            balance.name,
            balance.total_paid_cents.to_string(),
            balance.total_owed_cents.to_string(),
            balance.net_cents.to_string(),
            status
        );
    }
}

fn cmd_split(args: &[String]) {
    let options = parse_group_options(args, false);
    let record = load_group(&options.input);

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct SplitOutput {
        expense_id: String,
        payer_id: String,
        amount_cents: i64,
        shares: Vec<settlement_engine::balance::shares::Share>,
    }

    let mut output = Vec::new();
    for expense in record.expenses.iter().filter(|e| e.is_open()) {
        let shares = resolve_shares(expense).unwrap_or_else(|e| fail(e.into()));
        output.push(SplitOutput {
            expense_id: expense.id().to_string(),
            payer_id: expense.payer_id().to_string(),
            amount_cents: expense.amount_cents().cents(),
            shares,
        });
    }

    if options.json {
        println!("{}", to_json(&output));
        return;
    }

    for split in &output {
        println!(
            "{} paid by {}: ${}",
            split.expense_id,
            split.payer_id,
            rust_decimal::Decimal::new(split.amount_cents, 2)
        );
        for share in &split.shares {
            let marker = if share.extra_cent { " (+1c)" } else { "" };
            println!("  {:<20} {}{}", share.attendee_id, share.share_cents, marker);
        }
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = GroupConfig::default();
    let mut seed: Option<u64> = None;
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--attendees" => {
                i += 1;
                config.attendee_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--attendees requires a number");
                        process::exit(1);
                    });
            }
            "--expenses" => {
                i += 1;
                config.expense_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--expenses requires a number");
                        process::exit(1);
                    });
            }
            "--payments" => {
                i += 1;
                config.payment_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--payments requires a number");
                        process::exit(1);
                    });
            }
            "--seed" => {
                i += 1;
                seed = Some(args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--seed requires a number");
                    process::exit(1);
                }));
            }
            "--output" => {
                i += 1;
                output_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--output requires a file path");
                    process::exit(1);
                }));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let record = match seed {
        Some(seed) => generate_group_with(&mut StdRng::seed_from_u64(seed), &config),
        None => generate_group(&config),
    };
    let json = to_json(&record);

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} expenses across {} attendees → {}",
            record.expenses.len(),
            record.attendees.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "preview" => cmd_preview(rest),
        "settle" => cmd_settle(rest),
        "balances" => cmd_balances(rest),
        "split" => cmd_split(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
