use std::fs;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use backdex_protocol::{DaemonRequest, DaemonResponse};
use clap::Args;

use crate::commands::CommandResult;
use crate::commands::client::{DaemonClient, unexpected};
use crate::printer::Printer;

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page to fetch, starting at 1
    #[arg(long, short = 'p', default_value_t = 1)]
    pub page: usize,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Words to look for; an entry matches if any word prefixes one of its terms
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args)]
pub struct PathArgs {
    /// File or directory, relative to the current directory or absolute
    pub path: PathBuf,
}

impl PathArgs {
    /// The index is keyed by absolute paths. Entries that no longer exist on
    /// disk can still be looked up, so fall back to a lexical absolute path
    /// when canonicalizing fails.
    pub fn index_key(&self) -> CommandResult<String> {
        let resolved = match fs::canonicalize(&self.path) {
            Ok(path) => path,
            Err(_) => std::path::absolute(&self.path)
                .with_context(|| format!("cannot resolve {}", self.path.display()))?,
        };

        resolved
            .into_os_string()
            .into_string()
            .map_err(|raw| anyhow!("path is not valid UTF-8: {}", raw.to_string_lossy()))
    }
}

pub fn files(client: &DaemonClient, printer: &mut dyn Printer, args: &PageArgs) -> CommandResult<()> {
    match client.call(DaemonRequest::ListFiles { page: args.page })? {
        DaemonResponse::Files(page) => Ok(printer.file_page(&page)?),
        other => Err(unexpected(other)),
    }
}

pub fn search(
    client: &DaemonClient,
    printer: &mut dyn Printer,
    args: &SearchArgs,
) -> CommandResult<()> {
    let query = args.query.join(" ");
    let request = DaemonRequest::Search {
        query: query.clone(),
        page: args.page.page,
    };

    match client.call(request)? {
        DaemonResponse::Search(result) => Ok(printer.search(&query, &result)?),
        other => Err(unexpected(other)),
    }
}

pub fn stat(client: &DaemonClient, printer: &mut dyn Printer, args: &PathArgs) -> CommandResult<()> {
    let path = args.index_key()?;
    match client.call(DaemonRequest::GetFile { path })? {
        DaemonResponse::File(record) => Ok(printer.record(&record)?),
        other => Err(unexpected(other)),
    }
}

pub fn ls(client: &DaemonClient, printer: &mut dyn Printer, args: &PathArgs) -> CommandResult<()> {
    let path = args.index_key()?;
    match client.call(DaemonRequest::ListDir { path: path.clone() })? {
        DaemonResponse::Dir(listing) => Ok(printer.listing(&path, &listing)?),
        other => Err(unexpected(other)),
    }
}

#[cfg(test)]
#[path = "browse_tests.rs"]
mod tests;
