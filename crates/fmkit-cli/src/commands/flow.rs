use anyhow::{anyhow, Result};
use console::style;
use fmkit::flows::{catalog, ExportFormat};
use std::fs;
use std::path::Path;

pub fn list() -> Result<()> {
    for flow in catalog::all()? {
        println!(
            "{}  {}",
            style(&flow.name).bold(),
            style(flow.description.as_deref().unwrap_or("")).dim()
        );
    }
    Ok(())
}

pub fn export(name: &str, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let flow = catalog::by_name(name).ok_or_else(|| {
        anyhow!(
            "unknown flow '{}'; available: {}",
            name,
            catalog::FLOW_NAMES.join(", ")
        )
    })??;
    let rendered = flow.export(format)?;

    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            println!("{} {} to {}", style("Exported").green(), name, path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
