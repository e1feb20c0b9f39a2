use chrono::Local;
use rust_decimal::Decimal;

use crate::amounts::format_units;
use crate::chain::ChainHealth;
use crate::executor::{ExecutionResult, ExecutionStatus};
use crate::scanner::ScanReport;
use crate::state::{ChainStatus, EngineSnapshot};

const RULE: &str = "═══════════════════════════════════════════════════════════════";

fn header(title: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    println!();
    println!("{}", RULE);
    println!("  {} | {}", title, timestamp);
    println!("{}", RULE);
}

/// `+$1.23` in green, `-$0.40` in red.
fn signed_usd(value: Decimal) -> String {
    let rounded = value.round_dp(4);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("\x1b[1;31m-${}\x1b[0m", rounded.abs())
    } else {
        format!("\x1b[1;32m+${}\x1b[0m", rounded)
    }
}

pub fn print_health(checks: &[ChainHealth]) {
    header("CHAIN HEALTH");
    for check in checks {
        check.print_status();
    }
    println!();
}

pub fn print_scan(report: &ScanReport) {
    header(&format!("SCAN {}", report.chain.as_str().to_uppercase()));
    println!(
        "  routes {} | opportunities {} | rejected {} | {}ms",
        report.routes_evaluated,
        report.opportunities.len(),
        report.rejected,
        report.latency_ms
    );
    for (strategy, n) in &report.quote_skips {
        println!("  \x1b[33mquote unavailable\x1b[0m {:<12} x{}", strategy.as_str(), n);
    }
    println!();

    if report.opportunities.is_empty() {
        println!("  no profitable routes");
        println!();
        return;
    }

    println!(
        "  {:<4} {:<11} {:<44} {:>8} {:>10} {:>12}",
        "#", "STRATEGY", "ROUTE", "SPREAD", "QUOTE GAS", "NET USD"
    );
    for (i, opp) in report.opportunities.iter().enumerate() {
        let amount = format_units(opp.route.amount_in, opp.route.base.decimals);
        println!(
            "  {:<4} {:<11} {:<44} {:>6}bp {:>10} {:>12}",
            i + 1,
            opp.route.strategy.as_str(),
            format!("{} {}", amount, opp.route.label()),
            opp.spread_bps,
            opp.quote.total_gas_estimate,
            signed_usd(opp.net_profit_usd)
        );
    }
    println!();
}

pub fn print_result(result: &ExecutionResult) {
    header("EXECUTION REPORT");
    println!("  Opportunity: #{} on {}", result.opportunity_id, result.chain);
    println!("  Route:       {}", result.route);

    match result.status {
        ExecutionStatus::Success => println!("  Status:      \x1b[1;32mSUCCESS\x1b[0m"),
        ExecutionStatus::Failed => println!("  Status:      \x1b[1;31mFAILED\x1b[0m"),
        ExecutionStatus::Skipped => println!("  Status:      \x1b[1;33mSKIPPED\x1b[0m"),
    }
    if let Some(step) = result.failed_step {
        println!("  Failed at:   {}", step);
    }
    if let Some(error) = &result.error {
        println!("  Reason:      {}", error);
    }

    println!("  Expected:    {}", signed_usd(result.expected_profit_usd));
    if let Some(realized) = result.realized_profit_usd {
        println!("  Realized:    {}", signed_usd(realized));
    }
    println!("  Gas:         ${}", result.gas_cost_usd.round_dp(4));
    for (i, hash) in result.tx_hashes.iter().enumerate() {
        println!("  tx {}:        {}", i + 1, hash);
    }
    println!("  Elapsed:     {}ms", result.elapsed_ms);
    println!("{}", RULE);
}

pub fn print_balances(statuses: &[ChainStatus]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      WALLET BALANCES                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    if let Some(first) = statuses.first() {
        println!("  Wallet: {:?}", first.wallet);
    }

    for status in statuses {
        println!();
        if !status.live {
            println!(
                "  \x1b[1;31m{:<10}\x1b[0m unavailable: {}",
                status.chain.as_str(),
                status.error.as_deref().unwrap_or("unknown")
            );
            continue;
        }
        println!("  \x1b[1;36m{}\x1b[0m", status.chain.as_str());
        println!("    {:>8}: {:>24}", "ETH", format_units(status.native_balance, 18));
        println!("    {:>8}: {:>24}", "WETH", format_units(status.wrapped_balance, 18));
        println!("    {:>8}: {:>24}", "USDC", format_units(status.stable_balance, 6));
        if let Some(usd) = status.balance_usd {
            println!("    {:>8}: {:>24}", "USD", usd);
        }
    }
    println!();
}

pub fn print_status(snapshot: &EngineSnapshot) {
    header("ENGINE STATUS");
    let stats = &snapshot.stats;
    println!(
        "  running {} | dry run {} | executing {}",
        snapshot.running, snapshot.dry_run, snapshot.is_executing
    );
    println!(
        "  scans {} (errors {}) | opportunities {}",
        stats.total_scans, stats.scan_errors, stats.opportunities_found
    );
    println!(
        "  trades {} | ok {} | failed {} | skipped {}",
        stats.trades_attempted, stats.trades_succeeded, stats.trades_failed, stats.trades_skipped
    );
    match snapshot.win_rate {
        Some(rate) => println!("  win rate {}%", rate),
        None => println!("  win rate n/a"),
    }
    println!(
        "  profit {} | gas ${}",
        signed_usd(stats.total_profit_usd),
        stats.total_gas_usd.round_dp(4)
    );
    if let Some(best) = &snapshot.best_today {
        println!(
            "  best today: {} on {} {}",
            best.route.label(),
            best.chain,
            signed_usd(best.net_profit_usd)
        );
    }
    if let Some(error) = &snapshot.last_error {
        println!("  last error: \x1b[31m{}\x1b[0m", error);
    }
    println!("{}", RULE);
}
