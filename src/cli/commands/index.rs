//! hs index - Rebuild the term dictionary and document embeddings

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::rebuild;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Minimum corpus frequency for a dictionary term (overrides config)
    #[arg(long)]
    pub min_frequency: Option<u32>,

    /// Skip rebuilding document embeddings
    #[arg(long)]
    pub no_embeddings: bool,
}

pub fn run(ctx: &AppContext, args: &IndexArgs) -> Result<()> {
    let config = IndexConfig {
        min_frequency: args
            .min_frequency
            .unwrap_or(ctx.config.index.min_frequency)
            .max(1),
        ..ctx.config.index.clone()
    };
    let embedder = if args.no_embeddings {
        None
    } else {
        ctx.embedder()
    };

    let report = {
        let db = ctx.db.lock();
        rebuild(&db, &config, embedder.as_deref())?
    };

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&report, &ctx.config.robot), &ctx.config.robot);
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Index rebuilt")
        .kv("Documents", &report.documents.to_string())
        .kv("Terms", &report.terms.to_string());
    for (language, count) in &report.terms_by_language {
        layout.bullet(&format!("{language}: {count}"));
    }
    layout
        .kv("Phonetic", &report.phonetic_terms.to_string())
        .kv(
            "Embeddings",
            &report
                .embeddings
                .map_or_else(|| "skipped".to_string(), |n| n.to_string()),
        )
        .kv("Elapsed", &format!("{}ms", report.elapsed_ms));
    emit_human(layout);
    Ok(())
}
