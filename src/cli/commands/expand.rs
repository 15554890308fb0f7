//! hs expand - Show phonetic and fuzzy expansion of a query

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Query to expand
    pub query: String,

    /// Disable phonetic matching for English tokens
    #[arg(long)]
    pub no_phonetic: bool,
}

pub fn run(ctx: &AppContext, args: &ExpandArgs) -> Result<()> {
    let mut config = ctx.config.expansion.clone();
    if args.no_phonetic {
        config.phonetic = false;
    }
    let expansion = ctx.expander_with(config).expand(&args.query);

    if ctx.robot_mode() {
        return emit_robot(&robot_ok(&expansion, &ctx.config.robot), &ctx.config.robot);
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Query expansion")
        .kv("Language", expansion.language.as_str())
        .kv("Original", &expansion.original.join(" "));
    let added: Vec<&str> = expansion.added().collect();
    if added.is_empty() {
        layout.kv("Added", "(none)");
    } else {
        layout.kv("Added", "");
        for term in added {
            layout.bullet(term);
        }
    }
    emit_human(layout);
    Ok(())
}
