//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod expand;
pub mod fuse;
pub mod import;
pub mod index;
pub mod search;

use crate::app::AppContext;
use crate::error::Result;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import documents from a JSON Lines file and rebuild the full-text index
    Import(import::ImportArgs),

    /// Rebuild the term dictionary and document embeddings
    Index(index::IndexArgs),

    /// Show how a query is expanded
    Expand(expand::ExpandArgs),

    /// Hybrid search over the corpus
    Search(search::SearchArgs),

    /// Fuse two ranked lists of document ids with RRF
    Fuse(fuse::FuseArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Import(args) => import::run(ctx, args),
        Commands::Index(args) => index::run(ctx, args),
        Commands::Expand(args) => expand::run(ctx, args),
        Commands::Search(args) => search::run(ctx, args),
        Commands::Fuse(args) => fuse::run(ctx, args),
    }
}
