use std::io::{self, Write};

use backdex_protocol::{DaemonStatus, DirListing, FilePage, FileRecord, RescanSummary, SearchResult};
use backdex_runtime::SEARCH_PAGE_SIZE;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns with optional colors.
    #[default]
    Human,
    /// One JSON document per response, same shape as the HTTP API.
    Json,
}

/// Color handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Automatically detect TTY and enable colors if appropriate.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub format: OutputFormat,
    pub color: ColorChoice,
}

/// Renders daemon responses. Data goes to stdout, footers and hints to
/// stderr so piping the listing stays clean.
pub trait Printer {
    fn file_page(&mut self, page: &FilePage) -> io::Result<()>;

    fn search(&mut self, query: &str, result: &SearchResult) -> io::Result<()>;

    fn record(&mut self, record: &FileRecord) -> io::Result<()>;

    fn listing(&mut self, dir: &str, listing: &DirListing) -> io::Result<()>;

    fn rescan(&mut self, summary: &RescanSummary) -> io::Result<()>;

    fn status(&mut self, status: &DaemonStatus) -> io::Result<()>;

    /// Free-form status text from the daemon.
    fn message(&mut self, text: &str) -> io::Result<()>;
}

pub struct HumanPrinter<W: Write, E: Write> {
    out: W,
    err: E,
    use_color: bool,
}

impl<W: Write, E: Write> HumanPrinter<W, E> {
    /// `Auto` means no color here: a generic writer is not checked for a
    /// terminal. Use [`HumanPrinter::stdout`] for TTY detection.
    pub fn new(out: W, err: E, cfg: PrinterConfig) -> Self {
        let use_color = cfg.color == ColorChoice::Always;
        Self {
            out,
            err,
            use_color,
        }
    }

    /// Create a printer that writes to stdout and stderr with TTY detection.
    pub fn stdout(cfg: PrinterConfig) -> HumanPrinter<io::Stdout, io::Stderr> {
        use std::io::IsTerminal;

        let use_color = match cfg.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        };

        HumanPrinter {
            out: io::stdout(),
            err: io::stderr(),
            use_color,
        }
    }

    #[inline]
    fn format_path(&self, record: &FileRecord) -> String {
        match (self.use_color, record.is_dir) {
            (true, true) => format!("\x1b[1;34m{}/\x1b[0m", record.path),
            (true, false) => format!("\x1b[32m{}\x1b[0m", record.path),
            (false, true) => format!("{}/", record.path),
            (false, false) => record.path.clone(),
        }
    }

    fn row(&mut self, record: &FileRecord) -> io::Result<()> {
        let path = self.format_path(record);
        writeln!(
            self.out,
            "{} {:>12} {} {:<9} {}",
            record.mode_string,
            record.size,
            record.mod_time.format("%Y-%m-%d %H:%M:%S"),
            record.backup_state.as_str(),
            path,
        )
    }
}

impl<W: Write, E: Write> Printer for HumanPrinter<W, E> {
    fn file_page(&mut self, page: &FilePage) -> io::Result<()> {
        for record in &page.files {
            self.row(record)?;
        }

        if page.files.is_empty() {
            writeln!(self.err, "no entries on page {}", page.page)?;
        }
        if page.has_more {
            writeln!(self.err, "... more on page {} (backdex files -p {})", page.page + 1, page.page + 1)?;
        }
        Ok(())
    }

    fn search(&mut self, query: &str, result: &SearchResult) -> io::Result<()> {
        for record in &result.files {
            self.row(record)?;
        }

        writeln!(
            self.err,
            "\n[search] {} matches for {:?} (page {})",
            result.total, query, result.page
        )?;
        if result.page.saturating_mul(SEARCH_PAGE_SIZE) < result.total {
            writeln!(self.err, "... more on page {}", result.page + 1)?;
        }
        Ok(())
    }

    fn record(&mut self, record: &FileRecord) -> io::Result<()> {
        let kind = if record.is_dir { "directory" } else { "file" };
        writeln!(self.out, "path:     {}", record.path)?;
        writeln!(self.out, "type:     {kind}")?;
        writeln!(self.out, "size:     {}", record.size)?;
        writeln!(self.out, "mode:     {} ({:o})", record.mode_string, record.mode)?;
        writeln!(self.out, "modified: {}", record.mod_time.to_rfc3339())?;
        writeln!(self.out, "backup:   {}", record.backup_state.as_str())?;
        writeln!(self.out, "revision: {}", record.revision)
    }

    fn listing(&mut self, dir: &str, listing: &DirListing) -> io::Result<()> {
        for record in &listing.items {
            self.row(record)?;
        }
        writeln!(
            self.err,
            "{dir}: {} directories, {} files",
            listing.num_dirs, listing.num_files
        )
    }

    fn rescan(&mut self, summary: &RescanSummary) -> io::Result<()> {
        writeln!(
            self.out,
            "rescanned {}: {} entries ({} new, {} stale, {} unchanged, {} failed)",
            summary.path,
            summary.dispatched,
            summary.created,
            summary.marked_stale,
            summary.unchanged,
            summary.failed,
        )?;
        if let Some(reason) = &summary.aborted {
            writeln!(self.err, "walk stopped early: {reason}")?;
        }
        Ok(())
    }

    fn status(&mut self, status: &DaemonStatus) -> io::Result<()> {
        writeln!(self.out, "root:     {}", status.root)?;
        writeln!(self.out, "index:    {}", status.index_path)?;
        writeln!(self.out, "records:  {}", status.records)?;
        writeln!(
            self.out,
            "activity: {}",
            status.busy_with.as_deref().unwrap_or("idle")
        )
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }
}

pub struct JsonPrinter<W: Write, E: Write> {
    out: W,
    err: E,
}

impl<W: Write, E: Write> JsonPrinter<W, E> {
    pub fn new(out: W, err: E, _cfg: PrinterConfig) -> Self {
        Self { out, err }
    }

    /// Create a printer that writes to stdout and stderr.
    pub fn stdout(cfg: PrinterConfig) -> JsonPrinter<io::Stdout, io::Stderr> {
        JsonPrinter::new(io::stdout(), io::stderr(), cfg)
    }

    fn emit<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)
    }
}

impl<W: Write, E: Write> Printer for JsonPrinter<W, E> {
    fn file_page(&mut self, page: &FilePage) -> io::Result<()> {
        self.emit(page)
    }

    fn search(&mut self, query: &str, result: &SearchResult) -> io::Result<()> {
        let obj = serde_json::json!({
            "query": query,
            "total": result.total,
            "page": result.page,
            "files": result.files,
        });
        self.emit(&obj)
    }

    fn record(&mut self, record: &FileRecord) -> io::Result<()> {
        self.emit(record)
    }

    fn listing(&mut self, _dir: &str, listing: &DirListing) -> io::Result<()> {
        self.emit(listing)
    }

    fn rescan(&mut self, summary: &RescanSummary) -> io::Result<()> {
        if let Some(reason) = &summary.aborted {
            let warning = serde_json::json!({ "type": "warning", "message": reason });
            writeln!(self.err, "{warning}")?;
        }
        self.emit(summary)
    }

    fn status(&mut self, status: &DaemonStatus) -> io::Result<()> {
        self.emit(status)
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        self.emit(&serde_json::json!({ "message": text }))
    }
}

#[cfg(test)]
#[path = "printer_tests.rs"]
mod tests;
