//! Reporting and export — JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: the full `BacktestResult`, schema-versioned
//! - **CSV**: fills, trade tape and equity curve
//! - **Markdown**: a human-readable single-run report
//!
//! Results with a schema version newer than this build understands are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::paper::{Fill, TradeRecord};
use crate::runner::{BacktestResult, EquityPoint, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: entry_time, exit_time, quantity, entry_price, exit_price,
/// gross_pnl, commission, net_pnl, return_pct
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_time",
        "exit_time",
        "quantity",
        "entry_price",
        "exit_price",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_time.to_rfc3339(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.8}", t.quantity),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.exit_price),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.4}", t.return_pct),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: time, side, quantity, price, commission
pub fn export_fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "side", "quantity", "price", "commission"])?;
    for f in fills {
        wtr.write_record([
            f.time.to_rfc3339(),
            f.side.to_string(),
            format!("{:.8}", f.quantity),
            format!("{:.6}", f.price),
            format!("{:.2}", f.commission),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: bar_open, equity (marked at the bar's close)
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_open", "equity"])?;
    for point in equity_curve {
        wtr.write_record([point.bar_open.to_rfc3339(), format!("{:.2}", point.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{timestamp}/` under `output_dir` containing
/// `manifest.json`, `fills.csv`, `trades.csv`, `equity.csv`, and `report.md`.
/// Returns the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        result.symbol,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_file(&run_dir.join("manifest.json"), &export_json(result)?)?;
    write_file(&run_dir.join("fills.csv"), &export_fills_csv(&result.fills)?)?;
    write_file(&run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write_file(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&result.equity_curve)?,
    )?;
    write_file(&run_dir.join("report.md"), &generate_report(result))?;

    tracing::info!(dir = %run_dir.display(), "saved artifacts");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!("| Interval | {} |\n", result.interval));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Order Quantity | {} |\n", result.order_quantity));
    if let Some(ceiling) = result.quantity_ceiling {
        md.push_str(&format!("| Quantity Ceiling | {} |\n", ceiling));
    }
    md.push_str(&format!("| Start Balance | {:.2} |\n", result.start_balance));
    md.push_str(&format!(
        "| Commission | {:.4}% |\n",
        result.commission * 100.0
    ));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Signals\n\n");
    md.push_str("| Resolved Label | Steps |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| bullish | {} |\n", result.labels.bullish));
    md.push_str(&format!("| bearish | {} |\n", result.labels.bearish));
    md.push_str(&format!("| unknown | {} |\n", result.labels.unknown));
    md.push('\n');
    md.push_str(&format!(
        "Intents: {} buy, {} sell, {} skip. Rejected by the broker: {}.\n\n",
        result.intents.buy, result.intents.sell, result.intents.skip, result.rejected_orders
    ));

    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Equity | {:.2} |\n", m.final_equity));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return_pct));
    md.push_str(&format!("| Buy & Hold | {:.2}% |\n", m.buy_and_hold_pct));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown_pct));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate_pct));
    md.push_str(&format!("| Best Trade | {:.2}% |\n", m.best_trade_pct));
    md.push_str(&format!("| Worst Trade | {:.2}% |\n", m.worst_trade_pct));
    md.push_str(&format!("| Exposure | {:.1}% |\n", m.exposure_pct));
    md.push('\n');

    if let Some(open) = &result.open_position {
        md.push_str("## Open Position\n\n");
        md.push_str(&format!(
            "{} units since {}, entry {:.2}, mark {:.2}, unrealized {:.2}.\n\n",
            open.quantity, open.entry_time, open.entry_price, open.mark_price, open.unrealized_pnl
        ));
    }

    md
}
