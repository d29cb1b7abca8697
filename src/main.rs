use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use pathmanifest::cli::{Cli, Commands};
use pathmanifest::output::{self, Verbosity};
use pathmanifest::utils::logger;
use pathmanifest::{PatchContext, commands};
use std::io;
use std::process;

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    output::set_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose));

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(0);
    }

    let mut ctx = PatchContext::new(cli.root, cli.config)?;
    if cli.debug {
        ctx.config.core.debug = true;
    }
    logger::init(ctx.debug());
    output::verbose(&format!("Using configuration {}", ctx.config_path.display()));

    match cli.command {
        Commands::WriteManifest { filter, force } => {
            commands::write_manifest::execute(&ctx, &filter, force)?;
        }
        Commands::Check { filter } => {
            // Exit status 2 signals "changes present" for scripting.
            if commands::check::execute(&ctx, &filter)? {
                return Ok(2);
            }
        }
        Commands::MakePatch {
            name,
            filter,
            output,
            max_files,
        } => {
            commands::make_patch::execute(&ctx, &name, &filter, &output, max_files)?;
        }
        Commands::ShowApplied { files_only } => {
            commands::show_applied::execute(&ctx, files_only)?;
        }
        Commands::ReadPatch { archive, json } => {
            commands::read_patch::execute(&ctx, &archive, json)?;
        }
        Commands::Verify { patch } => {
            commands::verify::execute(&ctx, &patch)?;
        }
        Commands::MarkApplied { archive } => {
            commands::mark_applied::execute(&ctx, &archive)?;
        }
        Commands::Completion { .. } => {}
    }

    Ok(0)
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
