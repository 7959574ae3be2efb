use crate::cli::ElementCommands;
use crate::support::{Context, element_or_exit, parse_props_or_exit, print_json};
use reqgraph_store::{DeletePolicy, Element, OWNER_FIELD};
use serde_json::{Value, json};

pub fn run(context: &Context, command: ElementCommands) {
    match command {
        ElementCommands::Create {
            project,
            element_type,
            props,
            id,
            owner,
            json,
        } => run_create(context, &project, &element_type, &props, id, owner, json),

        ElementCommands::Get { project, id, json } => run_get(context, &project, &id, json),

        ElementCommands::List {
            project,
            element_type,
            json,
        } => run_list(context, &project, element_type.as_deref(), json),

        ElementCommands::Patch {
            project,
            id,
            props,
            json,
        } => run_patch(context, &project, &id, &props, json),

        ElementCommands::Delete {
            project,
            id,
            cascade,
            force,
            json,
        } => run_delete(context, &project, &id, DeletePolicy { cascade, force }, json),
    }
}

fn summary_line(element: &Element) -> String {
    let label = element
        .string_property("name")
        .or_else(|| element.string_property("reqId"))
        .unwrap_or("");
    match element.owner_id() {
        Some(owner) => format!("{} [{}] {} (in {owner})", element.id, element.element_type, label),
        None => format!("{} [{}] {}", element.id, element.element_type, label),
    }
}

fn run_create(
    context: &Context,
    project: &str,
    element_type: &str,
    props: &str,
    id: Option<String>,
    owner: Option<String>,
    json_output: bool,
) {
    let mut properties = parse_props_or_exit(props);
    if let Some(id) = id {
        properties.insert("id".to_string(), Value::String(id));
    }
    if let Some(owner) = owner {
        properties.insert(OWNER_FIELD.to_string(), Value::String(owner));
    }
    let element = element_or_exit(context.service.create(project, element_type, properties));

    if json_output {
        print_json(&json!({
            "action": "element.create",
            "project": project,
            "element": element
        }));
    } else {
        println!("reqgraph element create\n  Added: {}", summary_line(&element));
    }
}

fn run_get(context: &Context, project: &str, id: &str, json_output: bool) {
    let element = element_or_exit(context.service.get(project, id));
    if json_output {
        print_json(&element);
        return;
    }
    println!("{}", summary_line(&element));
    for (key, value) in &element.properties {
        println!("  {key}: {value}");
    }
    for (feature, children) in &element.contents {
        println!("  {feature}: {}", children.join(", "));
    }
}

fn run_list(context: &Context, project: &str, element_type: Option<&str>, json_output: bool) {
    let elements = element_or_exit(context.service.query(project, element_type));
    if json_output {
        print_json(&json!({
            "action": "element.list",
            "project": project,
            "count": elements.len(),
            "items": elements
        }));
    } else {
        println!(
            "reqgraph element list\n  Project: {project}\n  Count: {}",
            elements.len()
        );
        for element in &elements {
            println!("  - {}", summary_line(element));
        }
    }
}

fn run_patch(context: &Context, project: &str, id: &str, props: &str, json_output: bool) {
    let patch = parse_props_or_exit(props);
    let element = element_or_exit(context.service.patch(project, id, patch));
    if json_output {
        print_json(&json!({
            "action": "element.patch",
            "project": project,
            "element": element
        }));
    } else {
        println!("reqgraph element patch\n  Updated: {}", summary_line(&element));
    }
}

fn run_delete(
    context: &Context,
    project: &str,
    id: &str,
    policy: DeletePolicy,
    json_output: bool,
) {
    let deleted = element_or_exit(context.service.delete_with(project, id, policy));
    if json_output {
        print_json(&json!({
            "action": "element.delete",
            "project": project,
            "id": id,
            "deleted": deleted
        }));
    } else {
        println!("reqgraph element delete\n  Deleted: {id}");
    }
}
