//! Markdown rendering of a [`QueueReport`].

use std::fmt::Write as _;

use crate::constants::{BAR_MAX_BLOCKS, REPORT_COUNT_CAP, REPORT_MIN_PEAK_BAR};
use crate::monitor::stats::QueueReport;

const FULL_BLOCK: char = '█';
const HALF_BLOCK: char = '▌';

/// Proportional bar of at most six blocks, with a trailing half block when the
/// fractional part is at least one half. Empty when `maximum` is zero.
pub fn number_to_blocks(value: f64, maximum: f64) -> String {
    if maximum.is_nan() || maximum <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let units = (f64::from(BAR_MAX_BLOCKS) * value / maximum).clamp(0.0, f64::from(BAR_MAX_BLOCKS));
    let full = units.floor() as usize;
    let mut bar = FULL_BLOCK.to_string().repeat(full);
    if units.fract() >= 0.5 {
        bar.push(HALF_BLOCK);
    }
    bar
}

pub fn capped_number(value: u64) -> String {
    if value < REPORT_COUNT_CAP {
        value.to_string()
    } else {
        format!("> {REPORT_COUNT_CAP}")
    }
}

/// "2 days 3 hours 5 minutes"; seconds are only shown below one minute.
pub fn format_duration_secs(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    if total < 60 {
        return plural(total, "second");
    }

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| plural(n, unit))
        .collect();
    parts.join(" ")
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn table_row(out: &mut String, cells: &[String]) {
    let _ = writeln!(out, "| {} |", cells.join(" | "));
}

fn table_header(out: &mut String, headers: &[&str]) {
    let _ = writeln!(out, "| {} |", headers.join(" | "));
    let _ = writeln!(
        out,
        "|{}",
        headers.iter().map(|_| " --- |").collect::<String>()
    );
}

fn bar_cell(value: f64, maximum: f64) -> String {
    let rounded = if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    };
    let bar = number_to_blocks(value, maximum);
    if bar.is_empty() {
        capped_number(rounded)
    } else {
        format!("{bar} {}", capped_number(rounded))
    }
}

pub fn render_markdown(report: &QueueReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Modqueue Statistics\n");

    let max_peak = report
        .days
        .iter()
        .map(|d| d.peak_queue_length)
        .max()
        .unwrap_or(0);
    let peak_scale = max_peak.max(REPORT_MIN_PEAK_BAR) as f64;
    let average_scale = max_peak as f64 / 2.0;

    table_header(
        &mut out,
        &[
            "Date",
            "Average Queue",
            "Peak Queue",
            "Average Time before action",
            "Max Time before action",
            "Mod Actions",
        ],
    );
    for day in &report.days {
        table_row(
            &mut out,
            &[
                day.date.format("%a %b %d %Y").to_string(),
                bar_cell(day.avg_queue_length as f64, average_scale),
                bar_cell(day.peak_queue_length as f64, peak_scale),
                format_duration_secs(day.avg_action_delay_secs as f64),
                format_duration_secs(day.max_action_delay_secs as f64),
                capped_number(day.action_count),
            ],
        );
    }
    out.push('\n');

    match report.summary.since {
        Some(since) => {
            let _ = writeln!(out, "Since {}:\n", since.format("%a, %d %b %Y %H:%M:%S GMT"));
        }
        None => out.push_str("Since the monitor started:\n\n"),
    }

    match &report.summary.queue {
        Some(queue) => {
            let _ = writeln!(out, "* Average queue length: {}", queue.avg_queue_length);
            let _ = writeln!(
                out,
                "* Peak queue length: {} at {}",
                queue.peak_queue_length,
                queue.peak_at.format("%a, %d %b %Y %H:%M:%S GMT")
            );
        }
        None => out.push_str("* No queue lengths recorded yet.\n"),
    }
    match &report.summary.actions {
        Some(actions) => {
            let _ = writeln!(
                out,
                "* Mod actions: {} (excludes automated filter actions)",
                actions.total_actions
            );
            if let Some(per_day) = actions.actions_per_day {
                let _ = writeln!(out, "* Average actions/day: {per_day}");
            }
            let _ = writeln!(
                out,
                "* Average time to handle a queue item: {}",
                format_duration_secs(actions.avg_delay_secs)
            );
            let _ = writeln!(
                out,
                "* Maximum time to handle a queue item: {}",
                format_duration_secs(actions.max_delay_secs)
            );
        }
        None => out.push_str("* No mod actions recorded.\n"),
    }

    out.push_str("\n## Time of day statistics\n\n");
    out.push_str("This covers the last four weeks worth of data.\n\n");

    let hour_scale = report
        .hours
        .iter()
        .flat_map(|h| [h.avg_queue_length, h.avg_action_count])
        .fold(0.0_f64, f64::max);
    table_header(
        &mut out,
        &[
            "Hour",
            "Average Queue Size",
            "Average Action Count",
            "Average Action Delay",
        ],
    );
    for hour in &report.hours {
        table_row(
            &mut out,
            &[
                hour.hour.to_string(),
                bar_cell(hour.avg_queue_length, hour_scale),
                bar_cell(hour.avg_action_count, hour_scale),
                format_duration_secs(hour.avg_action_delay_secs),
            ],
        );
    }

    out.push_str(
        "\nOnly actions and queue lengths seen since the monitor started are included. \
         Mod actions cover approve/remove actions on queue items only. All times in UTC.\n",
    );
    out
}
