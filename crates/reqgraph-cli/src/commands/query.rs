use crate::support::{Context, element_or_exit, or_exit, print_json};
use reqgraph_query::{QuerySpec, apply};

pub struct Args {
    pub project: String,
    pub page: usize,
    pub size: usize,
    pub sort: Vec<String>,
    pub filter: Vec<String>,
    pub search: Option<String>,
    pub json: bool,
}

pub fn run(context: &Context, args: Args) {
    let mut spec = QuerySpec::new(args.page, args.size);
    for text in &args.sort {
        spec.sort.push(or_exit(QuerySpec::parse_sort(text)));
    }
    for text in &args.filter {
        spec.filter.push(or_exit(QuerySpec::parse_filter(text)));
    }
    spec.search = args.search;

    let snapshot = element_or_exit(context.service.snapshot(&args.project));
    let result = or_exit(apply(&snapshot, &spec));

    if args.json {
        print_json(&result);
        return;
    }
    println!(
        "reqgraph query\n  Project: {}\n  Page: {}/{} (size {}, total {})",
        args.project,
        result.page.saturating_add(1),
        result.total_pages.max(1),
        result.size,
        result.total_elements
    );
    for element in &result.content {
        println!("  - {} [{}]", element.id, element.element_type);
    }
}
