use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::grid::CalendarGrid;
use crate::model::{Category, Interval, Phase};
use crate::timeline::TimelineLayout;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, leaves))]
    pub fn print_interval_table(&mut self, leaves: &[Interval]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Category".to_string(),
            "Label".to_string(),
        ];

        let mut rows = Vec::with_capacity(leaves.len());
        for entry in leaves {
            let id = entry
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let category = self.paint(entry.category.name(), category_code(entry.category));

            rows.push(vec![
                self.paint(&id, "33"),
                entry.start_day.format("%Y-%m-%d").to_string(),
                entry.end_day.format("%Y-%m-%d").to_string(),
                category,
                entry.label.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, phases))]
    pub fn print_phase_table(&mut self, phases: &[Phase]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Progress".to_string(),
            "Label".to_string(),
        ];

        let mut rows = Vec::with_capacity(phases.len());
        for entry in phases {
            let id = entry
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());

            rows.push(vec![
                self.paint(&id, "33"),
                entry.start_date.format("%Y-%m-%d").to_string(),
                entry.end_date.format("%Y-%m-%d").to_string(),
                format!("{}%", entry.progress_pct),
                entry.label.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Seven-column month table. Cells carry the day number plus one marker
    /// letter per overlapping leave entry; today is shown inverted.
    #[tracing::instrument(skip(self, grid))]
    pub fn print_calendar(&mut self, grid: &CalendarGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{} {}", month_name(grid.month), grid.year)?;

        let headers: Vec<String> = grid
            .week_start
            .column_headers()
            .iter()
            .map(ToString::to_string)
            .collect();

        let mut rows = Vec::with_capacity(grid.weeks.len());
        for week in &grid.weeks {
            let mut row = Vec::with_capacity(7);
            for cell in week {
                let Some(date) = cell.date else {
                    row.push(String::new());
                    continue;
                };

                let markers: String = cell
                    .overlaps
                    .iter()
                    .map(|entry| entry.category.marker())
                    .collect();
                let text = if markers.is_empty() {
                    format!("{:>2}", date.day())
                } else {
                    format!("{:>2} {markers}", date.day())
                };

                let painted = if cell.is_today {
                    self.paint(&text, "7")
                } else if let Some(first) = cell.overlaps.first() {
                    self.paint(&text, category_code(first.category))
                } else {
                    text
                };
                row.push(painted);
            }
            rows.push(row);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Proportional bars over a fixed-width character axis. Percentages map
    /// to columns; the minimum-width floor from the layout already keeps
    /// one-day phases visible, and bars are clipped to the axis edge.
    #[tracing::instrument(skip(self, layout))]
    pub fn print_timeline(&mut self, layout: &TimelineLayout, width: usize) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let width = width.clamp(20, 200);

        writeln!(
            out,
            "{} .. {} ({} days)",
            layout.window_start.format("%Y-%m-%d"),
            layout.window_end.format("%Y-%m-%d"),
            layout.total_days
        )?;

        let label_width = layout
            .bars
            .iter()
            .map(|bar| UnicodeWidthStr::width(bar.phase.label.as_str()))
            .max()
            .unwrap_or(0)
            .max(5);

        for bar in &layout.bars {
            let start_col = ((bar.left_pct / 100.0) * width as f64).round() as usize;
            let start_col = start_col.min(width.saturating_sub(1));
            let len = ((bar.width_pct / 100.0) * width as f64).round() as usize;
            let len = len.clamp(1, width - start_col);

            let filled = ((bar.phase.progress_pct as usize) * len + 50) / 100;
            let mut axis: Vec<char> = vec![' '; width];
            for (offset, slot) in axis[start_col..start_col + len].iter_mut().enumerate() {
                *slot = if offset < filled { '█' } else { '░' };
            }

            let bar_text: String = axis.into_iter().collect();
            let label = format!("{:<label_width$}", bar.phase.label);
            writeln!(
                out,
                "{} |{}| {:>3}%",
                self.paint(&label, "36"),
                bar_text,
                bar.phase.progress_pct
            )?;
        }

        let mut ruler: Vec<char> = vec!['-'; width];
        for tick in &layout.ticks {
            let col = ((tick.offset_pct / 100.0) * width as f64).round() as usize;
            if let Some(slot) = ruler.get_mut(col) {
                *slot = '|';
            }
        }
        let ruler_text: String = ruler.into_iter().collect();
        writeln!(out, "{:<label_width$} +{}+", "", ruler_text)?;

        let mut labels = String::new();
        for tick in &layout.ticks {
            let col = ((tick.offset_pct / 100.0) * width as f64).round() as usize;
            if col >= labels.len() + 2 || labels.is_empty() {
                while labels.len() < col {
                    labels.push(' ');
                }
                labels.push_str(&tick.label);
            }
        }
        writeln!(out, "{:<label_width$}  {}", "", labels)?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn category_code(category: Category) -> &'static str {
    match category {
        Category::Vacation => "32",
        Category::Sick => "31",
        Category::Personal => "36",
        Category::Holiday => "35",
        Category::Other => "33",
    }
}

fn month_name(month: u32) -> &'static str {
    [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ]
    .get(month.saturating_sub(1) as usize % 12)
    .copied()
    .unwrap_or("Unknown")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
