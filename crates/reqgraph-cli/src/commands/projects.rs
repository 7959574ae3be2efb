use crate::support::{Context, or_exit, print_json};
use serde_json::json;

pub fn run(context: &Context, json_output: bool) {
    let store = context.service.store();
    let projects = or_exit(store.list_projects());

    if json_output {
        print_json(&json!({
            "action": "projects.list",
            "dataDir": store.root().display().to_string(),
            "count": projects.len(),
            "items": projects
        }));
    } else {
        println!(
            "reqgraph projects\n  Data dir: {}\n  Count: {}",
            store.root().display(),
            projects.len()
        );
        for project in projects {
            println!("  - {project}");
        }
    }
}
