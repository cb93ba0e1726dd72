//! Plain-text rendering of snapshots, detail blocks, the event log and help.

use std::fmt::Write as _;
use std::time::Duration;

use mdm_core::manager::{DetailView, LogEntry, Snapshot};

use super::keys::HELP;

/// `1536.0` → `"1.5 KiB"`.
pub fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn clock(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

fn cap(bytes_per_sec: u64) -> String {
    if bytes_per_sec == 0 {
        "-".to_string()
    } else {
        format!("{}/s", human_bytes(bytes_per_sec as f64))
    }
}

/// First row of the page holding `selected`.
fn page_start(selected: Option<usize>, page: usize) -> usize {
    let page = page.max(1);
    selected.map(|i| i - i % page).unwrap_or(0)
}

/// The list screen: header, one page of rows, status line.
pub fn list(snap: &Snapshot, page: usize) -> String {
    let mut out = String::new();
    let c = &snap.counts;
    let _ = writeln!(
        out,
        "[{}] all:{} inactive:{} paused:{} active:{} finished:{} failed:{}  {}",
        snap.mode,
        c.total(),
        c.inactive,
        c.paused,
        c.active,
        c.finished,
        c.failed,
        if snap.downloading { "downloading" } else { "stopped" },
    );

    if snap.rows.is_empty() {
        out.push_str("  (no downloads)\n");
    }
    let selected = snap.selected_index();
    let start = page_start(selected, page);
    for (idx, row) in snap.rows.iter().enumerate().skip(start).take(page.max(1)) {
        let marker = if Some(idx) == selected { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{}{:>4} {:<9} {:>6.1}% {:>12}/s eta {:>8} cap {:>12}  {}",
            marker,
            idx + 1,
            row.state,
            row.progress,
            human_bytes(row.bytes_per_sec),
            row.eta.to_string(),
            cap(row.speed_cap),
            row.name,
        );
    }

    let mut status = format!(
        "rows {}-{} of {}  total {}/s",
        if snap.rows.is_empty() { 0 } else { start + 1 },
        (start + page.max(1)).min(snap.rows.len()),
        snap.rows.len(),
        human_bytes(snap.total_bytes_per_sec),
    );
    if let Some(elapsed) = snap.session_elapsed {
        let _ = write!(status, "  session {}", clock(elapsed));
    }
    if let Some(msg) = &snap.status {
        let _ = write!(status, "  | {}", msg);
    }
    out.push_str(&status);
    out.push('\n');
    out
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

pub fn detail(view: Option<&DetailView>) -> String {
    let Some(d) = view else {
        return "nothing selected\n".to_string();
    };
    let mut out = String::new();
    let mut field = |name: &str, value: String| {
        let _ = writeln!(out, "{:<16} {}", name, value);
    };
    field("download", format!("{} {}", d.id, d.name));
    field("state", d.state.to_string());
    field("url", d.locator.clone());
    field("effective url", opt(&d.effective_url));
    field("file", d.destination.display().to_string());
    field("response", opt(&d.response_code));
    field("content type", opt(&d.content_type));
    field("content length", opt(&d.content_length));
    field(
        "received",
        format!(
            "{} this session, {} before",
            d.bytes_transferred, d.prior_bytes
        ),
    );
    field(
        "peer",
        match (&d.primary_ip, d.primary_port) {
            (Some(ip), Some(port)) => format!("{}:{}", ip, port),
            (Some(ip), None) => ip.clone(),
            _ => "-".to_string(),
        },
    );
    field("protocol", d.protocol.as_str().to_string());
    field("progress", format!("{:.1}%", d.progress));
    field("speed", format!("{}/s", human_bytes(d.bytes_per_sec)));
    field("speed cap", cap(d.speed_cap));
    field("referer", opt(&d.referer));
    field("elapsed", clock(d.elapsed));
    field("eta", d.eta.to_string());
    if let Some(err) = &d.error {
        field("error", err.clone());
    }
    out
}

/// The newest `limit` entries, oldest first.
pub fn log(entries: &[LogEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "(log is empty)\n".to_string();
    }
    let skip = entries.len().saturating_sub(limit);
    entries[skip..]
        .iter()
        .map(|e| format!("{}\n", e))
        .collect()
}

pub fn help() -> String {
    HELP.iter()
        .map(|(keys, what)| format!("  {:<14} {}\n", keys, what))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdm_core::manager::{EventLevel, RowView, StateCounts};
    use mdm_core::record::{RecordId, TransferState};
    use mdm_core::registry::FilterMode;
    use mdm_core::stats::Eta;

    fn row(n: u64, name: &str, state: TransferState) -> RowView {
        RowView {
            id: RecordId::new(n),
            name: name.into(),
            state,
            progress: 50.0,
            bytes_per_sec: 2048.0,
            eta: Eta::Remaining(Duration::from_secs(7)),
            speed_cap: 0,
        }
    }

    fn snapshot(rows: Vec<RowView>, selected: Option<u64>) -> Snapshot {
        let mut counts = StateCounts::default();
        counts.paused = rows.len();
        Snapshot {
            mode: FilterMode::All,
            rows,
            selected: selected.map(RecordId::new),
            counts,
            downloading: false,
            session_elapsed: None,
            total_bytes_per_sec: 0.0,
            status: None,
            exit_requested: false,
        }
    }

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(0.0), "0 B");
        assert_eq!(human_bytes(1023.0), "1023 B");
        assert_eq!(human_bytes(1536.0), "1.5 KiB");
        assert_eq!(human_bytes(3.0 * 1024.0 * 1024.0), "3.0 MiB");
    }

    #[test]
    fn clock_formats_hours() {
        assert_eq!(clock(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn list_marks_selection_and_pages() {
        let rows = (1..=5)
            .map(|n| row(n, &format!("f{}", n), TransferState::Paused))
            .collect();
        let out = list(&snapshot(rows, Some(4)), 2);
        assert!(out.contains(">   4"));
        assert!(out.contains("f3"));
        assert!(!out.contains("f1"));
        assert!(!out.contains("f5"));
        assert!(out.contains("rows 3-4 of 5"));
    }

    #[test]
    fn list_shows_status_and_session_clock() {
        let mut snap = snapshot(vec![row(1, "a.bin", TransferState::Active)], Some(1));
        snap.session_elapsed = Some(Duration::from_secs(61));
        snap.status = Some("nothing selected".into());
        let out = list(&snap, 10);
        assert!(out.contains("session 00:01:01"));
        assert!(out.contains("| nothing selected"));
    }

    #[test]
    fn empty_list() {
        let out = list(&snapshot(Vec::new(), None), 10);
        assert!(out.contains("(no downloads)"));
        assert!(out.contains("rows 0-0 of 0"));
    }

    #[test]
    fn detail_without_selection() {
        assert_eq!(detail(None), "nothing selected\n");
    }

    #[test]
    fn log_keeps_newest() {
        let entries: Vec<LogEntry> = (0..5)
            .map(|i| LogEntry {
                at: Duration::from_secs(i),
                level: EventLevel::Info,
                message: format!("m{}", i),
            })
            .collect();
        let out = log(&entries, 2);
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("m3") && out.contains("m4"));
    }

    #[test]
    fn help_lists_quit() {
        assert!(help().contains("quit"));
    }
}
