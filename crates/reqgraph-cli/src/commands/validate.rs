use crate::support::{Context, element_or_exit, print_json};
use reqgraph_check::validate_static;

pub fn run(context: &Context, project: String, json_output: bool) {
    let service = &context.service;
    let (snapshot, snapshot_ref) = element_or_exit(service.snapshot_with_ref(&project));
    let report = validate_static(service.schema(), &snapshot, &context.config.validation)
        .with_snapshot_ref(snapshot_ref);

    if json_output {
        print_json(&report);
    } else {
        println!(
            "[validate] {} (project={}, elements={}, violations={})",
            if report.accepted() { "OK" } else { "FAIL" },
            project,
            report.summary.element_count,
            report.summary.violation_count
        );
        for violation in &report.violations {
            println!(
                "  - {} {} ({})",
                violation.element_id, violation.rule, violation.message
            );
        }
    }

    if !report.accepted() {
        std::process::exit(1);
    }
}
