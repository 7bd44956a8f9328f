//! Transfer load driver
//!
//! Run with: cargo run --bin transfer_load --release -- --transfers 1000 --workers 8
//!
//! Seeds two accounts, fires transfers in both directions concurrently and
//! checks that the total number of credits is unchanged afterwards.

use std::time::Instant;

use chrono::NaiveDate;
use credit_ledger::account::AccountRepository;
use credit_ledger::db::schema::ensure_schema;
use credit_ledger::domain::NewAccount;
use credit_ledger::handlers::TransferHandler;
use credit_ledger::{Config, Database};

const STARTING_CREDITS: i32 = 10_000;

fn arg_or(args: &[String], flag: &str, default: u64) -> u64 {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let transfer_count = arg_or(&args, "--transfers", 1000);
    let workers = arg_or(&args, "--workers", 8).max(1);

    let config = Config::from_env()?;

    println!(
        "Load Test - {} transfers across {} workers",
        transfer_count, workers
    );
    println!("Connecting to database...");

    let db = Database::connect(&config.database, "credit_ledger_load")?;
    ensure_schema(&db).await?;

    let repo = AccountRepository::new(db.clone());
    let dob = NaiveDate::from_ymd_opt(1990, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid seed date"))?;
    let run_id = uuid::Uuid::new_v4().simple().to_string();

    let a = repo
        .create(
            NewAccount::new(format!("load-a-{}@example.com", run_id), "x", "Load A", dob)
                .with_credits(STARTING_CREDITS),
        )
        .await?;
    let b = repo
        .create(
            NewAccount::new(format!("load-b-{}@example.com", run_id), "x", "Load B", dob)
                .with_credits(STARTING_CREDITS),
        )
        .await?;

    let start = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();

    for worker in 0..workers {
        let handler = TransferHandler::new(db.clone());
        let (a_id, b_id) = (a.id, b.id);
        let share = transfer_count / workers + u64::from(worker < transfer_count % workers);

        tasks.spawn(async move {
            let mut ok = 0u64;
            let mut failed = 0u64;
            for i in 0..share {
                let (src, dst) = if (worker + i) % 2 == 0 {
                    (a_id, b_id)
                } else {
                    (b_id, a_id)
                };
                match handler.transfer(src, dst, 1).await {
                    Ok(_) => ok += 1,
                    Err(_) => failed += 1,
                }
            }
            (ok, failed)
        });
    }

    let mut success_count = 0u64;
    let mut failure_count = 0u64;
    while let Some(result) = tasks.join_next().await {
        let (ok, failed) = result?;
        success_count += ok;
        failure_count += failed;
    }

    let elapsed = start.elapsed();
    let rate = success_count as f64 / elapsed.as_secs_f64();

    let a_after = repo
        .find_by_id(a.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account {} disappeared", a.id))?;
    let b_after = repo
        .find_by_id(b.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account {} disappeared", b.id))?;
    let total = i64::from(a_after.credits) + i64::from(b_after.credits);

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfer_count);
    println!("Successful: {}", success_count);
    println!("Failed: {}", failure_count);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!("Balances: {} / {} (total {})", a_after.credits, b_after.credits, total);

    repo.delete(a.id).await?;
    repo.delete(b.id).await?;
    db.shutdown().await;

    if total != 2 * i64::from(STARTING_CREDITS) {
        anyhow::bail!("credits not conserved: expected {}, got {}", 2 * STARTING_CREDITS, total);
    }

    Ok(())
}
