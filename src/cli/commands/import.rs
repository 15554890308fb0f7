//! hs import - Load documents from JSON Lines
//!
//! One document per line: `{"doc_id": 1, "book_id": 2, "en_text": "...",
//! "ar_text": "...", "bn_text": "...", "ur_text": "..."}`. Only `doc_id` is
//! required. Existing documents with the same id are replaced.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::{HsError, Result};
use crate::storage::Document;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines file with one document per line
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Skip malformed lines instead of aborting
    #[arg(long)]
    pub skip_invalid: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub file: PathBuf,
    pub imported: usize,
    pub skipped: usize,
    pub total_documents: usize,
}

pub fn run(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let (documents, problems) = read_documents(&args.path, args.skip_invalid)?;

    let db = ctx.db.lock();
    let imported = db.insert_documents(&documents)?;
    db.rebuild_fts()?;
    let report = ImportReport {
        file: args.path.clone(),
        imported,
        skipped: problems.len(),
        total_documents: db.document_count()?,
    };
    drop(db);

    info!(
        imported = report.imported,
        skipped = report.skipped,
        "documents imported"
    );

    if ctx.robot_mode() {
        let response = robot_ok(&report, &ctx.config.robot).with_warnings(problems);
        emit_robot(&response, &ctx.config.robot)
    } else {
        let mut layout = HumanLayout::new();
        layout
            .title("Import")
            .kv("File", &report.file.display().to_string())
            .kv("Imported", &report.imported.to_string())
            .kv("Skipped", &report.skipped.to_string())
            .kv("Total", &report.total_documents.to_string());
        for problem in &problems {
            layout.warning(problem);
        }
        layout.blank().push_line("Run `hs index` to rebuild the term dictionary.");
        emit_human(layout);
        Ok(())
    }
}

/// Parse a JSON Lines file. With `skip_invalid`, malformed lines are
/// reported instead of failing the import.
pub fn read_documents(path: &Path, skip_invalid: bool) -> Result<(Vec<Document>, Vec<String>)> {
    let file = std::fs::File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            HsError::NotFound(format!("import file {}", path.display()))
        } else {
            HsError::Io(err)
        }
    })?;

    let mut documents = Vec::new();
    let mut problems = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(&line) {
            Ok(doc) => documents.push(doc),
            Err(err) => {
                let problem = format!("{}:{}: {err}", path.display(), idx + 1);
                if !skip_invalid {
                    return Err(HsError::InvalidArgument(problem));
                }
                warn!(%problem, "skipping malformed document");
                problems.push(problem);
            }
        }
    }
    Ok((documents, problems))
}
