use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use colored::*;
use tokio::{io::BufReader, sync::mpsc};

use crate::{
    db::AttendanceRecord,
    export::{export_filename, render_csv, write_csv, AttendanceStats},
    scanner::{spawn_blocking_line_reader, spawn_line_reader, ScanEvent, ScanOutcome},
    settings::ScannerSettings,
    store::StoragePreference,
    AppContext,
};

fn print_record(index: usize, record: &AttendanceRecord) {
    let local = record.scan_timestamp.with_timezone(&Local);
    println!(
        "{:>4}  {}  {}  {}  {}",
        index,
        local.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        record.name.bold(),
        record.country.cyan(),
        record.id.dimmed(),
    );
}

fn print_outcome(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Recorded { record } => println!(
            "{} {} ({})",
            "recorded".green().bold(),
            record.name,
            record.country
        ),
        ScanOutcome::Duplicate { payload } => {
            println!("{} already scanned: {payload:?}", "duplicate".yellow().bold())
        }
        ScanOutcome::ParseFailed { payload } => println!(
            "{} could not read name and country from {payload:?}",
            "unreadable".red().bold()
        ),
        ScanOutcome::Suppressed => {}
    }
}

pub async fn scan(ctx: &AppContext, input: Option<PathBuf>, unescape_newlines: bool) -> Result<()> {
    let source = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            spawn_line_reader(BufReader::new(file), unescape_newlines)
        }
        // A terminal read never completes on its own; keep it off the runtime
        // so Ctrl-C can end the process.
        None => spawn_blocking_line_reader(io::BufReader::new(io::stdin()), unescape_newlines)
            .context("failed to start stdin reader")?,
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ScanEvent::Outcome(outcome) => print_outcome(&outcome),
                ScanEvent::Failed { payload, message } => {
                    eprintln!("{} {payload:?}: {message}", "error".red().bold())
                }
            }
        }
    });

    ctx.controller.start_scanning(source, events_tx).await?;
    println!(
        "Scanning ({} storage). Press Ctrl-C to stop.",
        ctx.controller.store().backend().as_str()
    );

    tokio::select! {
        _ = ctx.controller.finished() => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    let state = ctx.controller.stop().await?;
    printer.await.context("scan output task failed")?;
    ctx.controller.reset().await?;

    let counters = state.counters;
    println!(
        "{} recorded, {} duplicates, {} unreadable",
        counters.recorded.to_string().green(),
        counters.duplicates.to_string().yellow(),
        counters.parse_failures.to_string().red(),
    );
    Ok(())
}

pub async fn record(ctx: &AppContext, payload: &str) -> Result<()> {
    ctx.controller.start().await?;
    let outcome = ctx.controller.handle_payload(payload, Utc::now()).await;
    ctx.controller.stop().await?;

    let outcome = outcome?;
    print_outcome(&outcome);
    match outcome {
        ScanOutcome::Recorded { .. } | ScanOutcome::Suppressed => Ok(()),
        ScanOutcome::Duplicate { .. } => bail!("payload was already recorded"),
        ScanOutcome::ParseFailed { .. } => bail!("payload could not be parsed"),
    }
}

pub async fn list(ctx: &AppContext, json: bool) -> Result<()> {
    let records = ctx.controller.records().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No attendance records yet.");
        return Ok(());
    }

    for (index, record) in records.iter().enumerate() {
        print_record(index + 1, record);
    }
    Ok(())
}

pub async fn delete(ctx: &AppContext, id: &str) -> Result<()> {
    match ctx.controller.delete_record(id).await? {
        Some(record) => {
            println!("Deleted {} ({})", record.name, record.country);
            Ok(())
        }
        None => bail!("no record with id {id}"),
    }
}

pub async fn clear(ctx: &AppContext, yes: bool) -> Result<()> {
    if !yes && !prompt_confirm("Delete ALL attendance records?", Some(false))? {
        println!("Nothing deleted.");
        return Ok(());
    }

    let removed = ctx.controller.clear_records().await?;
    println!("Deleted {removed} records.");
    Ok(())
}

pub async fn export(ctx: &AppContext, output: Option<PathBuf>, stdout: bool) -> Result<()> {
    let records = ctx.controller.records().await?;

    if stdout {
        print!("{}", render_csv(&records, &Local)?);
        return Ok(());
    }

    if records.is_empty() {
        bail!("no records to export");
    }

    let path = output.unwrap_or_else(|| PathBuf::from(export_filename(Local::now().date_naive())));
    let rows = write_csv(&records, &Local, &path)?;
    println!("Exported {rows} records to {}", path.display());
    Ok(())
}

pub async fn stats(ctx: &AppContext) -> Result<()> {
    let records = ctx.controller.records().await?;
    let stats = AttendanceStats::compute(&records, Local::now().date_naive(), &Local);

    println!("Total:     {}", stats.total.to_string().bold());
    println!("Today:     {}", stats.today.to_string().bold());
    println!("Countries: {}", stats.countries.to_string().bold());
    for entry in &stats.by_country {
        println!("  {:<24} {}", entry.country, entry.count);
    }
    Ok(())
}

pub fn settings(
    ctx: &AppContext,
    cooldown_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    storage: Option<StoragePreference>,
) -> Result<()> {
    let current = ctx.settings.scanner();

    if cooldown_ms.is_some() || poll_interval_ms.is_some() || storage.is_some() {
        let updated = ScannerSettings {
            cooldown_ms: cooldown_ms.unwrap_or(current.cooldown_ms),
            poll_interval_ms: poll_interval_ms.unwrap_or(current.poll_interval_ms),
            storage: storage.unwrap_or(current.storage),
        };
        ctx.settings.update_scanner(updated)?;
    }

    println!("{}", serde_json::to_string_pretty(&ctx.settings.scanner())?);
    println!("(settings file: {})", ctx.settings.path().display());
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
