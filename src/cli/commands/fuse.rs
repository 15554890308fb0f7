//! hs fuse - Fuse two ranked id lists with reciprocal rank fusion
//!
//! Each input file holds a JSON array of document ids ordered best-first,
//! e.g. `[12, 7, 40]`. Use `-` to read one of the lists from stdin.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::{HsError, Result};
use crate::search::hybrid::{DocId, FusedResult, RrfConfig, fuse_ids};

#[derive(Args, Debug)]
pub struct FuseArgs {
    /// JSON array of lexical result ids, best first
    #[arg(value_name = "LEXICAL")]
    pub lexical: PathBuf,

    /// JSON array of semantic result ids, best first
    #[arg(value_name = "SEMANTIC")]
    pub semantic: PathBuf,

    /// RRF smoothing constant (defaults to fusion.k)
    #[arg(long)]
    pub k: Option<u32>,

    #[arg(long)]
    pub lexical_weight: Option<f64>,

    #[arg(long)]
    pub semantic_weight: Option<f64>,

    /// Maximum number of fused results (defaults to search.default_limit)
    #[arg(long, short)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FuseReport {
    pub k: u32,
    pub lexical_weight: f64,
    pub semantic_weight: f64,
    pub count: usize,
    pub results: Vec<FusedResult>,
}

pub fn run(ctx: &AppContext, args: &FuseArgs) -> Result<()> {
    if args.lexical == Path::new("-") && args.semantic == Path::new("-") {
        return Err(HsError::InvalidArgument(
            "only one list can be read from stdin".to_string(),
        ));
    }

    let defaults = ctx.config.fusion.to_rrf();
    let config = RrfConfig {
        k: args.k.unwrap_or(defaults.k),
        lexical_weight: args.lexical_weight.unwrap_or(defaults.lexical_weight),
        semantic_weight: args.semantic_weight.unwrap_or(defaults.semantic_weight),
    };
    let limit = args.limit.unwrap_or(ctx.config.search.default_limit);

    let lexical = read_ids(&args.lexical)?;
    let semantic = read_ids(&args.semantic)?;
    let results = fuse_ids(&lexical, &semantic, &config, limit)?;

    let report = FuseReport {
        k: config.k,
        lexical_weight: config.lexical_weight,
        semantic_weight: config.semantic_weight,
        count: results.len(),
        results,
    };

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&report, &ctx.config.robot), &ctx.config.robot);
    }

    let mut layout = HumanLayout::new();
    layout
        .title("RRF fusion")
        .kv("k", &report.k.to_string())
        .kv(
            "Weights",
            &format!(
                "lexical {} / semantic {}",
                report.lexical_weight, report.semantic_weight
            ),
        )
        .kv("Results", &report.count.to_string())
        .blank();
    for (idx, fused) in report.results.iter().enumerate() {
        layout.push_line(format!(
            "{:>3}. #{}  score {:.6}  lexical {}  semantic {}",
            idx + 1,
            fused.doc_id,
            fused.score,
            rank_label(fused.lexical_rank),
            rank_label(fused.semantic_rank),
        ));
    }
    emit_human(layout);
    Ok(())
}

/// Read a JSON array of ids from a file, or stdin for `-`.
pub fn read_ids(path: &Path) -> Result<Vec<DocId>> {
    let body = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                HsError::NotFound(format!("id list {}", path.display()))
            } else {
                HsError::Io(err)
            }
        })?
    };
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&body).map_err(|err| {
        HsError::InvalidArgument(format!(
            "{}: expected a JSON array of document ids: {err}",
            path.display()
        ))
    })
}

fn rank_label(rank: Option<u32>) -> String {
    rank.map_or_else(|| "-".to_string(), |r| r.to_string())
}
