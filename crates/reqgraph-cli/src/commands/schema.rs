use crate::cli::SchemaCommands;
use crate::support::{Context, print_json};
use reqgraph_schema::REQUIRED_CHAIN;
use serde_json::json;

pub fn run(context: &Context, command: SchemaCommands) {
    match command {
        SchemaCommands::Check { json } => run_check(context, json),
        SchemaCommands::Show { class, json } => run_show(context, &class, json),
    }
}

fn run_check(context: &Context, json_output: bool) {
    let schema = context.schema();
    if json_output {
        print_json(&json!({
            "action": "schema.check",
            "name": schema.name(),
            "version": schema.version(),
            "classCount": schema.class_count(),
            "classes": schema.class_names().collect::<Vec<_>>(),
            "requiredChain": REQUIRED_CHAIN,
            "result": "accepted"
        }));
    } else {
        println!(
            "reqgraph schema check\n  Schema: {} v{}\n  Classes: {}\n  Chain: {}",
            schema.name(),
            schema.version(),
            schema.class_count(),
            REQUIRED_CHAIN.join(" <: ")
        );
    }
}

fn run_show(context: &Context, class_name: &str, json_output: bool) {
    let Some(class) = context.schema().class(class_name) else {
        eprintln!("error: unknown schema class: {class_name}");
        std::process::exit(1);
    };

    if json_output {
        print_json(&json!({
            "action": "schema.show",
            "name": class.name,
            "supertypes": class.supertypes(),
            "attributes": class.attributes(),
            "containment": class.containment_features()
        }));
        return;
    }

    println!("reqgraph schema show\n  Class: {}", class.name);
    if !class.supertypes().is_empty() {
        println!("  Supertypes: {}", class.supertypes().join(", "));
    }
    for attribute in class.attributes() {
        println!(
            "  - {}: {}{}",
            attribute.name,
            attribute.kind.as_str(),
            if attribute.required { " (required)" } else { "" }
        );
    }
    for feature in class.containment_features() {
        println!("  + {} contains {}", feature.name, feature.accepts);
    }
}
