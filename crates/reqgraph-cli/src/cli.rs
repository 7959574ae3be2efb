use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "reqgraph",
    about = "reqgraph: schema-driven element store for requirement graphs",
    version
)]
pub struct Cli {
    /// Path to reqgraph.toml (defaults to ./reqgraph.toml when present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Directory holding one JSON document per project
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Schema source file (bundled vocabulary when absent)
    #[arg(long, global = true)]
    pub schema: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect the loaded schema
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },

    /// List projects under the data directory
    Projects {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create, read, update and delete elements
    Element {
        #[command(subcommand)]
        command: ElementCommands,
    },

    /// Run static validation over one project
    Validate {
        /// Project id
        project: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Filter, search, sort and page through a project's elements
    Query {
        /// Project id
        project: String,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Page size (1..=200)
        #[arg(long, default_value_t = 20)]
        size: usize,

        /// Sort key `field[:asc|desc]`; repeat for secondary keys
        #[arg(long)]
        sort: Vec<String>,

        /// Filter `field:value`; repeated filters must all match
        #[arg(long)]
        filter: Vec<String>,

        /// Case-insensitive substring search
        #[arg(long)]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a JSON array of flat element entries
    Import {
        /// Project id
        project: String,

        /// Path to the JSON file
        file: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Load the schema and report its size and required chain
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one class: supertypes, attributes, containment features
    Show {
        /// Class name
        class: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ElementCommands {
    /// Create an element of any schema type
    Create {
        /// Project id
        project: String,

        /// Schema class of the new element
        #[arg(long = "type")]
        element_type: String,

        /// Property bag as a JSON object
        #[arg(long, default_value = "{}")]
        props: String,

        /// Optional explicit element id
        #[arg(long)]
        id: Option<String>,

        /// Owning element id
        #[arg(long)]
        owner: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch one element
    Get {
        /// Project id
        project: String,

        /// Element id
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List elements depth-first, optionally of one exact type
    List {
        /// Project id
        project: String,

        /// Keep only this schema class
        #[arg(long = "type")]
        element_type: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge properties into an element (`null` removes a key)
    Patch {
        /// Project id
        project: String,

        /// Element id
        id: String,

        /// Partial property bag as a JSON object
        #[arg(long)]
        props: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an element
    Delete {
        /// Project id
        project: String,

        /// Element id
        id: String,

        /// Delete the whole containment subtree
        #[arg(long)]
        cascade: bool,

        /// Delete even if other elements still reference it
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
