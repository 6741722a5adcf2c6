//! Command-line front end for parsing, querying and re-serializing XML and
//! HTML files.
//!
//! Exit codes: 0 on success, 1 when a document fails to parse or a query
//! fails, 2 when input or output fails.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use xmlsift::serial::{self, SerializeOptions};
use xmlsift::xpath::{ItemRef, XPathValue};
use xmlsift::{Document, Error, ParseOptions};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Parse, query and re-serialize XML and HTML documents.
#[derive(Parser, Debug)]
#[command(name = "xmlsift", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Files to process; standard input when none are given.
    files: Vec<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    verbose: bool,

    // -- Parsing options ---------------------------------------------------
    /// Parse input as HTML instead of XML.
    #[arg(long)]
    html: bool,

    /// Recover from structural errors instead of failing.
    #[arg(long)]
    recover: bool,

    /// Remove whitespace-only text nodes.
    #[arg(long)]
    noblanks: bool,

    /// Declared input encoding, used when the input has no byte-order mark.
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    // -- Queries -----------------------------------------------------------
    /// Evaluate an XPath expression at the document node and print the result.
    #[allow(clippy::doc_markdown)]
    #[arg(long, value_name = "EXPR")]
    xpath: Option<String>,

    /// Select nodes with a CSS selector and print them.
    #[arg(long, value_name = "SELECTOR", conflicts_with = "xpath")]
    css: Option<String>,

    /// Bind a namespace prefix for queries (repeatable).
    #[arg(long = "define-prefix", value_name = "PREFIX=URI", value_parser = parse_binding)]
    define_prefix: Vec<(String, String)>,

    // -- Output options ----------------------------------------------------
    /// Pretty-print (indent) the output.
    #[arg(long)]
    format: bool,

    /// Output encoding label (e.g., UTF-8, ISO-8859-1).
    #[arg(long, value_name = "LABEL")]
    encode: Option<String>,

    /// Do not output the result tree.
    #[arg(long)]
    noout: bool,

    /// Log how long each phase took.
    #[arg(long)]
    timing: bool,
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() => Ok((prefix.to_string(), uri.to_string())),
        _ => Err(format!("expected PREFIX=URI, got '{s}'")),
    }
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_IO_ERROR: u8 = 2;

fn exit_code(err: &Error) -> u8 {
    match err {
        Error::Io(_) => EXIT_IO_ERROR,
        _ => EXIT_PARSE_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut worst_exit = EXIT_SUCCESS;
    if cli.files.is_empty() {
        worst_exit = process(&cli, "-");
    }
    for file in &cli.files {
        worst_exit = worst_exit.max(process(&cli, file));
    }
    ExitCode::from(worst_exit)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Processes one input and returns its exit code.
fn process(cli: &Cli, filename: &str) -> u8 {
    match run(cli, filename) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("{filename}: {err}");
            exit_code(&err)
        }
    }
}

fn run(cli: &Cli, filename: &str) -> xmlsift::Result<()> {
    let start = Instant::now();
    let mut doc = parse_input(cli, filename)?;
    if cli.timing {
        info!(file = filename, elapsed = ?start.elapsed(), "parsed");
    }
    for diag in &doc.diagnostics {
        debug!(file = filename, "{diag}");
    }
    for (prefix, uri) in &cli.define_prefix {
        doc.define_prefix(prefix, uri);
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.xpath.is_some() || cli.css.is_some() {
        let start = Instant::now();
        let value = match (&cli.xpath, &cli.css) {
            (Some(expr), _) => doc.eval(expr)?,
            (None, Some(selector)) => XPathValue::NodeSet(doc.css(selector)?),
            (None, None) => return Ok(()),
        };
        print_value(&doc, &value, &mut out)?;
        if cli.timing {
            info!(elapsed = ?start.elapsed(), "queried");
        }
    } else if !cli.noout {
        let start = Instant::now();
        let mut options = SerializeOptions::default()
            .indent(cli.format)
            .html(cli.html)
            .xml_declaration(!cli.html);
        if let Some(label) = &cli.encode {
            options = options.encoding(label);
        }
        serial::write_to(&doc, &options, &mut out)?;
        if !cli.format {
            out.write_all(b"\n")?;
        }
        if cli.timing {
            info!(elapsed = ?start.elapsed(), "serialized");
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_input(cli: &Cli, filename: &str) -> xmlsift::Result<Document> {
    let mut options = if cli.html {
        ParseOptions::html()
    } else {
        ParseOptions::default()
    };
    options = options.no_blanks(cli.noblanks);
    if cli.recover {
        options = options.recover(true);
    }
    if let Some(label) = &cli.encoding {
        options = options.encoding(label);
    }

    let reader: Box<dyn Read> = if filename == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(filename)?)
    };
    Document::parse_reader(reader, &options)
}

/// Prints a query result: nodes serialized one per line, attributes as
/// `name="value"`, other values as strings.
fn print_value(doc: &Document, value: &XPathValue, out: &mut impl Write) -> xmlsift::Result<()> {
    match value {
        XPathValue::NodeSet(nodes) => {
            for item in nodes {
                match doc.resolve(item)? {
                    ItemRef::Node(node) => writeln!(out, "{}", node.raw_xml())?,
                    ItemRef::Attribute(attr) => {
                        writeln!(out, "{}=\"{}\"", attr.name(), attr.value())?;
                    }
                }
            }
        }
        other => writeln!(out, "{other}")?,
    }
    Ok(())
}
