//! Tracegraph compiler CLI.
//!
//! Provides the `tracegraph` binary with two subcommands:
//! - `compile` loads a graph document and prints the generated program
//! - `wrap` carves a new span out of a graph document
//!
//! Both go through the same library entry points the editor uses. Program
//! text goes to stdout (or `--output`); logs and errors go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use tracegraph_codegen::{CodegenError, CompileOptions};
use tracegraph_core::{apply_new_span, CoreError, GraphDocument, NewSpan, NodeId, ProgramGraph};

/// Environment variable naming a default options file.
const OPTIONS_ENV: &str = "TRACEGRAPH_OPTIONS";

/// Tracegraph compiler and tools.
#[derive(Parser)]
#[command(name = "tracegraph", about = "Compile traced dataflow graphs to programs")]
struct Cli {
    /// Log compile phases to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a graph document to program text.
    Compile {
        /// Path to the graph document (JSON).
        #[arg(short, long)]
        graph: PathBuf,

        /// Options file (JSON). Defaults to $TRACEGRAPH_OPTIONS, then built-in defaults.
        #[arg(long)]
        options: Option<PathBuf>,

        /// Print the intermediate representation instead of program text.
        #[arg(long)]
        ir: bool,

        /// Write output here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a new span over a set of nodes and write the updated document.
    Wrap {
        /// Path to the graph document (JSON).
        #[arg(short, long)]
        graph: PathBuf,

        /// Comma-separated ids of the nodes to wrap.
        #[arg(short, long, value_delimiter = ',', required = true)]
        nodes: Vec<u32>,

        /// Id of the new span node.
        #[arg(long)]
        id: u32,

        /// Display name of the new span.
        #[arg(long)]
        name: String,

        /// Write the updated document here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Compile {
            graph,
            options,
            ir,
            output,
        } => run_compile(&graph, options, ir, output.as_deref()),
        Commands::Wrap {
            graph,
            nodes,
            id,
            name,
            output,
        } => run_wrap(&graph, &nodes, id, name, output.as_deref()),
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = compilation error, 3 = I/O or
/// parse error.
fn run_compile(graph_path: &Path, options: Option<PathBuf>, ir: bool, output: Option<&Path>) -> i32 {
    let options = match load_options(options) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: failed to load options: {}", e);
            return 3;
        }
    };

    let graph = match read_document(graph_path).map(ProgramGraph::from_document) {
        Ok(Ok(graph)) => graph,
        Ok(Err(e)) => {
            eprintln!("Error: invalid graph '{}': {}", graph_path.display(), e);
            return 1;
        }
        Err(code) => return code,
    };
    tracing::info!(nodes = graph.node_count(), "loaded graph {}", graph_path.display());

    let text = if ir {
        match tracegraph_codegen::compile_to_ir(&graph) {
            Ok(Some(expr)) => format!("{:#?}", expr),
            Ok(None) => String::new(),
            Err(e) => return report_compile_error(e),
        }
    } else {
        match tracegraph_codegen::compile(&graph, &options) {
            Ok(text) => text,
            Err(e) => return report_compile_error(e),
        }
    };

    write_output(output, &text)
}

/// Execute the wrap subcommand.
///
/// Returns exit code: 0 = success, 1 = containment error, 3 = I/O or
/// parse error.
fn run_wrap(graph_path: &Path, nodes: &[u32], id: u32, name: String, output: Option<&Path>) -> i32 {
    let doc = match read_document(graph_path) {
        Ok(doc) => doc,
        Err(code) => return code,
    };

    let request = NewSpan {
        id: NodeId(id),
        name,
        wrapped: nodes.iter().map(|&n| NodeId(n)).collect(),
    };
    let updated = match apply_new_span(&doc.nodes, request) {
        Ok(updated) => updated,
        Err(e) => {
            eprintln!("Error: cannot create span {}: {}", id, e);
            return 1;
        }
    };

    let doc = GraphDocument {
        nodes: updated,
        edges: doc.edges,
    };
    match doc.to_json() {
        Ok(json) => write_output(output, &json),
        Err(e) => {
            eprintln!("Error: failed to serialize graph: {}", e);
            3
        }
    }
}

/// Resolves options from `--options`, then the environment, then defaults.
fn load_options(path: Option<PathBuf>) -> Result<CompileOptions, CodegenError> {
    let path = path.or_else(|| std::env::var_os(OPTIONS_ENV).map(PathBuf::from));
    match path {
        Some(path) => {
            tracing::debug!("loading options from {}", path.display());
            CompileOptions::load(path)
        }
        None => Ok(CompileOptions::default()),
    }
}

/// Reads and decodes a graph document, mapping failures to exit code 3.
fn read_document(path: &Path) -> Result<GraphDocument, i32> {
    let json = fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    GraphDocument::from_json(&json).map_err(|e| {
        eprintln!("Error: failed to parse '{}': {}", path.display(), e);
        3
    })
}

fn write_output(output: Option<&Path>, text: &str) -> i32 {
    match output {
        Some(path) => match fs::write(path, format!("{}\n", text)) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: failed to write '{}': {}", path.display(), e);
                3
            }
        },
        None => {
            println!("{}", text);
            0
        }
    }
}

fn report_compile_error(err: CodegenError) -> i32 {
    match err {
        CodegenError::IoError(e) => {
            eprintln!("I/O error: {}", e);
            3
        }
        CodegenError::Core(CoreError::Malformed(e)) => {
            eprintln!("Error: malformed graph: {}", e);
            3
        }
        e => {
            eprintln!("Compilation error: {}", e);
            1
        }
    }
}
