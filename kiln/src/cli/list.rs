// kiln/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::error::Result;
use kiln_core::receipt::ReceiptSource;
use kiln_core::{get_installed_packages, InstalledPackageInfo};
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct List {}

impl List {
    pub fn run(&self, config: &Config) -> Result<()> {
        let installed = get_installed_packages(config)?;
        if installed.is_empty() {
            println!("{}", "0 packages installed".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Source").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
        ]));
        for pkg in &installed {
            table.add_row(Row::new(vec![
                Cell::new(&pkg.name).style_spec("Fb"),
                Cell::new(&pkg.version),
                Cell::new(source_label(pkg)),
                Cell::new(&installed_at(pkg)),
            ]));
        }
        table.printstd();
        println!("{}", format!("{} packages installed", installed.len()).bold());
        Ok(())
    }
}

fn source_label(pkg: &InstalledPackageInfo) -> &'static str {
    match pkg.receipt.as_ref().map(|r| &r.source) {
        Some(ReceiptSource::Archive { .. }) => "archive",
        Some(ReceiptSource::Head { .. }) => "head",
        None => "incomplete",
    }
}

fn installed_at(pkg: &InstalledPackageInfo) -> String {
    pkg.receipt
        .as_ref()
        .map(|r| r.time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
