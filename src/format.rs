use std::fmt::Write;

use chrono::SecondsFormat;

use crate::system::snapshot::SnapshotRecord;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Console rendering of one record, without a trailing newline.
pub fn render_text(record: &SnapshotRecord) -> String {
    let mut out = String::new();
    let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);

    // Writing into a String cannot fail.
    let _ = match &record.host {
        Some(host) => writeln!(out, "[{timestamp}] System Metrics ({host}):"),
        None => writeln!(out, "[{timestamp}] System Metrics:"),
    };

    let cpu = &record.cpu;
    let _ = writeln!(
        out,
        "  CPU Usage (Average: {}):",
        format_percent(cpu.average)
    );
    for (index, usage) in cpu.per_core.iter().enumerate() {
        let _ = writeln!(out, "    Core {index}: {}", format_percent(*usage));
    }

    let mem = &record.memory;
    let lines = [
        ("  Memory:", None),
        ("    Physical Memory", Some(mem.physical_memory)),
        ("    Memory Used", Some(mem.memory_used)),
        ("      - App Memory", Some(mem.app_memory)),
        ("      - Wired Memory", Some(mem.wired_memory)),
        ("      - Compressed", Some(mem.compressed_memory)),
        ("    Cached Files", Some(mem.cached_files)),
        ("    Swap Used", Some(mem.swap_used)),
    ];
    for (label, bytes) in lines {
        let _ = match bytes {
            Some(bytes) => writeln!(out, "{label}: {}", format_gib(bytes)),
            None => writeln!(out, "{label}"),
        };
    }

    out.truncate(out.trim_end().len());
    out
}

/// Single-line JSON rendering, one object per record.
pub fn render_json(record: &SnapshotRecord) -> serde_json::Result<String> {
    serde_json::to_string(record)
}
