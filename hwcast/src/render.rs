//! Plain-text rendering of updates: human-readable sizes and one summary line.

use chrono::{DateTime, Local};

use crate::types::Update;

pub fn human(b: i64) -> String {
    if b < 0 {
        return "n/a".into();
    }
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K { return format!("{b:.0}B"); }
    let kb = b / K;
    if kb < K { return format!("{kb:.1}KB"); }
    let mb = kb / K;
    if mb < K { return format!("{mb:.1}MB"); }
    let gb = mb / K;
    if gb < K { return format!("{gb:.1}GB"); }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

pub fn pct(v: f64) -> String {
    if v < 0.0 { "n/a".into() } else { format!("{v:.1}%") }
}

fn clock(ts: f64) -> String {
    let secs = ts.trunc() as i64;
    let nanos = (ts.fract() * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into())
}

/// One line per update, e.g. `12:00:01 cpu 12.5% | mem 50.0% (1.0GB/2.0GB) | / 40.0% | GPU0 30.0% 60C`.
pub fn summary_line(timestamp: f64, u: &Update) -> String {
    let mut parts = vec![
        format!("{} cpu {}", clock(timestamp), pct(u.cpu.usage)),
        format!(
            "mem {} ({}/{})",
            pct(u.memory.percent),
            human(u.memory.used),
            human(u.memory.total)
        ),
    ];
    parts.extend(u.drives.iter().map(|d| format!("{} {}", d.path, pct(d.used_percent))));
    parts.extend(u.gpus.iter().map(|g| {
        let temp = if g.gpu_temperature < 0.0 {
            "n/a".to_string()
        } else {
            format!("{:.0}C", g.gpu_temperature)
        };
        format!(
            "{} {} {} vram {}",
            g.name,
            pct(g.gpu_utilization),
            temp,
            pct(g.vram_used_percent)
        )
    }));
    parts.join(" | ")
}
