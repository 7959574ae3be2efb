//! reqgraph CLI: the `reqgraph` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let context = support::open_context_or_exit(&cli);

    match cli.command {
        Commands::Schema { command } => commands::schema::run(&context, command),

        Commands::Projects { json } => commands::projects::run(&context, json),

        Commands::Element { command } => commands::element::run(&context, command),

        Commands::Validate { project, json } => commands::validate::run(&context, project, json),

        Commands::Query {
            project,
            page,
            size,
            sort,
            filter,
            search,
            json,
        } => commands::query::run(
            &context,
            commands::query::Args {
                project,
                page,
                size,
                sort,
                filter,
                search,
                json,
            },
        ),

        Commands::Import {
            project,
            file,
            json,
        } => commands::import::run(&context, project, file, json),
    }
}
