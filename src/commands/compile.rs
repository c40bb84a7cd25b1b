//! `compile` - print the ordered resource graph

use anyhow::Result;
use colored::Colorize;
use hostplan::Compilation;
use hostplan::resource::Declaration;
use serde::Serialize;
use std::path::Path;

use crate::Context;
use crate::cli::OutputFormat;
use crate::config;
use crate::ui;

#[derive(Serialize)]
struct CompileOutput<'a> {
    fingerprint: String,
    declarations: Vec<&'a Declaration>,
}

pub fn run(ctx: &Context, config_path: &Path, format: OutputFormat) -> Result<()> {
    let (_, compilation) = config::compile(config_path)?;

    match format {
        OutputFormat::Json => {
            let output = CompileOutput {
                fingerprint: compilation.fingerprint()?,
                declarations: compilation.ordered(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => print_text(ctx, &compilation)?,
    }
    Ok(())
}

fn print_text(ctx: &Context, compilation: &Compilation) -> Result<()> {
    ui::header("Resources");

    if compilation.is_empty() {
        ui::dim("  (disabled)");
        return Ok(());
    }

    for (index, declaration) in compilation.ordered().iter().enumerate() {
        println!(
            "  {:>3}. {} {}",
            index + 1,
            declaration.id.as_str().bold(),
            format!("({})", declaration.kind_name()).dimmed()
        );
        if ctx.verbose > 0 {
            ui::dim(&format!("       {}", declaration.description));
            let after = compilation.graph().predecessors(&declaration.id);
            if !after.is_empty() {
                let names: Vec<_> = after.iter().map(|id| id.as_str()).collect();
                ui::dim(&format!("       after: {}", names.join(", ")));
            }
            if let Some(producer) = declaration.produced_by() {
                ui::dim(&format!("       produced by: {}", producer));
            }
        }
    }

    println!();
    ui::kv("Fingerprint", &compilation.fingerprint()?);
    Ok(())
}
