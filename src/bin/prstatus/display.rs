use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use prstatus::{DisplayMode, DisplayOptions, Progress, PullRequest, Report};

const TABLE_HEADERS: &[&str] = &["URL", "STATE", "BLOCKED BY", "CREATED", "TITLE"];
const TITLE_COLUMN_INDEX: usize = TABLE_HEADERS.len() - 1;
const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 3;

/// Prints `found/total` on a single, rewritten stderr line.
///
/// Silent when stderr is not a terminal.
pub struct StderrProgress {
    enabled: bool,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self {
            enabled: io::stderr().is_terminal(),
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            eprint!("\r\x1b[2K");
        }
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for StderrProgress {
    fn update(&self, found: usize, total: usize) {
        if self.enabled {
            eprint!("\rChecking pull requests {found}/{total}");
        }
    }
}

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn get_terminal_width(width_override: Option<usize>, truncate_titles: bool) -> usize {
    if let Some(width) = width_override {
        width
    } else if !truncate_titles {
        usize::MAX
    } else if io::stdout().is_terminal() {
        terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(usize::MAX)
    } else {
        std::env::var("COLUMNS")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(usize::MAX)
    }
}

fn pr_to_table_row(pr: &PullRequest) -> Vec<String> {
    vec![
        pr.url.clone(),
        pr.state.to_string(),
        pr.blocked_by.to_string(),
        format_relative_time(pr.created_at),
        pr.title.clone(),
    ]
}

fn display_width(cell: &str) -> usize {
    cell.chars().count()
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(display_width(cell));
            }
        }
    }

    widths
}

/// Narrows the title column to what the terminal leaves after the other
/// columns. Returns the new title width when truncation is needed.
fn fit_title_width(widths: &mut [usize], terminal_width: usize) -> Option<usize> {
    if terminal_width == usize::MAX {
        return None;
    }

    let separator_width = COLUMN_SEPARATOR.len() * (widths.len() - 1);
    let non_title_width: usize =
        widths[..TITLE_COLUMN_INDEX].iter().sum::<usize>() + separator_width;

    if non_title_width >= terminal_width {
        return None;
    }

    let available_title_width = terminal_width - non_title_width;
    if widths[TITLE_COLUMN_INDEX] > available_title_width
        && available_title_width > MIN_TITLE_WIDTH_FOR_TRUNCATION
    {
        widths[TITLE_COLUMN_INDEX] = available_title_width;
        Some(available_title_width)
    } else {
        None
    }
}

fn truncate_title_cells(rows: &mut [Vec<String>], title_width: usize) {
    for row in rows {
        if let Some(title) = row.get_mut(TITLE_COLUMN_INDEX)
            && display_width(title) > title_width
        {
            let keep = title_width - TITLE_TRUNCATION_SUFFIX.len();
            let truncated: String = title.chars().take(keep).collect();
            *title = format!("{truncated}{TITLE_TRUNCATION_SUFFIX}");
        }
    }
}

fn render_row<W: Write, S: AsRef<str>>(
    cells: &[S],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        if i == last {
            // No trailing padding on the final column.
            write!(writer, "{}", cell.as_ref())?;
        } else {
            write!(
                writer,
                "{:<width$}{COLUMN_SEPARATOR}",
                cell.as_ref(),
                width = widths[i]
            )?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table_separator<W: Write>(widths: &[usize], writer: &mut W) -> Result<()> {
    let dashes: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
    writeln!(writer, "{}", dashes.join(COLUMN_SEPARATOR))?;
    Ok(())
}

fn display_repository_header<W: Write>(
    repository: &str,
    count: usize,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "{repository} ({count})")?;
    Ok(())
}

fn display_report_quiet<W: Write>(report: &Report, writer: &mut W) -> Result<()> {
    for pr in report.pull_requests() {
        writeln!(writer, "{}", pr.url)?;
    }
    Ok(())
}

fn display_report_tables<W: Write>(
    report: &Report,
    writer: &mut W,
    width_override: Option<usize>,
    truncate_titles: bool,
) -> Result<()> {
    let terminal_width = get_terminal_width(width_override, truncate_titles);

    writeln!(
        writer,
        "Open pull requests for {}",
        report.viewer().display_name()
    )?;

    // One width set across all repositories keeps the tables aligned.
    let mut groups: Vec<(&str, Vec<Vec<String>>)> = report
        .repositories()
        .map(|group| {
            let rows = group.pull_requests.iter().map(pr_to_table_row).collect();
            (group.repository.as_str(), rows)
        })
        .collect();
    let all_rows: Vec<Vec<String>> = groups
        .iter()
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();
    let mut widths = calculate_column_widths(TABLE_HEADERS, &all_rows);
    if let Some(title_width) = fit_title_width(&mut widths, terminal_width) {
        for (_, rows) in groups.iter_mut() {
            truncate_title_cells(rows, title_width);
        }
    }

    for (repository, rows) in &groups {
        writeln!(writer)?;
        display_repository_header(repository, rows.len(), writer)?;
        render_row(TABLE_HEADERS, &widths, writer)?;
        render_table_separator(&widths, writer)?;
        for row in rows {
            render_row(row.as_slice(), &widths, writer)?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "{} shown, {} skipped", report.len(), report.skipped())?;
    Ok(())
}

pub fn display_report<W: Write>(
    report: &Report,
    options: &DisplayOptions,
    writer: &mut W,
) -> Result<()> {
    match options.mode {
        DisplayMode::Quiet => display_report_quiet(report, writer),
        DisplayMode::Normal => {
            display_report_tables(report, writer, None, options.truncate_titles)
        }
    }
}
