//! Grouped text rendering of a scan report.

use colored::*;
use seki_scanners::ScanReport;

fn input_label(input: &str) -> &'static str {
    if input.starts_with("0x") {
        "address"
    } else {
        "file"
    }
}

pub fn render(report: &ScanReport, input: &str) {
    if report.is_empty() {
        println!(
            "In {}: {} contains no Reentrancy vulnerability",
            input_label(input),
            input.green()
        );
        return;
    }

    for (file, contracts) in report.grouped() {
        match file {
            None => println!("In {}: {}:", input_label(input), input.bold()),
            Some(path) => println!("In file: {}:", path.bold()),
        }
        for (contract, functions) in contracts {
            println!("\tIn contract {}:", contract.cyan());
            for (function, findings) in functions {
                println!("\t\tIn function {}:", function.yellow());
                for finding in findings {
                    let location = finding
                        .line
                        .map(|line| format!(" (line {line})"))
                        .unwrap_or_default();
                    println!(
                        "\t\t\tVulnerability: {}{} [{}/{}]",
                        finding.kind.red().bold(),
                        location,
                        finding.severity,
                        finding.confidence
                    );
                }
            }
        }
    }
}
