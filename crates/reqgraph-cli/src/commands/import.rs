use crate::support::{Context, element_or_exit, print_json};
use reqgraph_store::Properties;
use serde_json::Value;
use std::fs;

fn read_entries_or_exit(file: &str) -> Vec<Properties> {
    let text = fs::read_to_string(file).unwrap_or_else(|e| {
        eprintln!("error: failed to read {file}: {e}");
        std::process::exit(1);
    });
    let entries = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            eprintln!("error: {file} must hold a JSON array of element entries");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: invalid JSON in {file}: {e}");
            std::process::exit(1);
        }
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(properties) => properties,
            _ => {
                eprintln!("error: entry {index} in {file} is not a JSON object");
                std::process::exit(1);
            }
        })
        .collect()
}

pub fn run(context: &Context, project: String, file: String, json_output: bool) {
    let entries = read_entries_or_exit(&file);
    let report = element_or_exit(context.service.import(&project, entries));

    if json_output {
        print_json(&report);
    } else {
        println!(
            "reqgraph import\n  Project: {project}\n  Result: {}\n  Created: {}\n  Failed: {}",
            if report.is_clean() { "clean" } else { "partial" },
            report.created,
            report.failures.len()
        );
        for failure in &report.failures {
            println!(
                "  - #{} {} [{}] {}",
                failure.index,
                failure.id.as_deref().unwrap_or("-"),
                failure.kind.as_str(),
                failure.message
            );
        }
    }
}
