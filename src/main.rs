use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use jsgff::meta::{stringify, stringify_value};
use jsgff::{
    ContentFlags, ContentValue, Document, EncodeOptions, FormatDefinition, FormatSpec, FsStorage, Map, Storage, Value,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsgff", about = "Inspect and write JSGFF container files")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file headers, metadata and content counts
    Info {
        input: PathBuf,
        /// Format code name expected in the magic numbers
        #[arg(short, long, default_value = "generic")]
        format: String,
    },
    /// Print every content entry
    Dump {
        input: PathBuf,
        #[arg(short, long, default_value = "generic")]
        format: String,
    },
    /// Decode with a JSON format definition and check its requirements
    Check {
        input: PathBuf,
        #[arg(short, long)]
        definition: PathBuf,
    },
    /// Write a small sample document
    WriteSample {
        output: PathBuf,
        #[arg(short, long, default_value = "generic")]
        format: String,
        /// Deflate level for compressed entries (0-9)
        #[arg(short, long, default_value = "6")]
        level: u32,
        /// Deflate the raw `data` entry
        #[arg(short, long)]
        compress: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli.command)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let storage = FsStorage::new();

    match command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, format } => {
            let format = FormatDefinition::new(format);
            let doc = Document::load(&format, &storage, &locator(&input)?)?;

            println!("── JSGFF/{} ─────────────────────────────────────────", format.code_name());
            println!("  Path      {}", input.display());
            println!("  Headers   {}", doc.headers().len());
            print_map(doc.headers());
            println!("  Metadata  {}", doc.metadata().len());
            print_map(doc.metadata());
            println!("  Content types ({}):", doc.contents().len());
            for (content_type, entries) in doc.contents().iter() {
                let compressed = entries.iter().filter(|e| e.flags.compressed).count();
                println!("    {:<20} {:>4} entries  {:>4} compressed", content_type, entries.len(), compressed);
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, format } => {
            let format = FormatDefinition::new(format);
            let doc = Document::load(&format, &storage, &locator(&input)?)?;
            dump(&doc);
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input, definition } => {
            let spec = load_definition(&storage, &definition)?;
            if spec.debug {
                tracing::debug!(definition = %definition.display(), "definition asks for debug output");
            }
            let format = FormatDefinition::from(spec);
            let bytes = storage.read(&locator(&input)?)?;
            let doc = format.decode_checked(&bytes)?;
            println!(
                "{}: valid JSGFF/{} file, {} content entries",
                input.display(),
                format.code_name(),
                doc.entries().count()
            );
        }

        // ── Write sample ─────────────────────────────────────────────────────
        Commands::WriteSample { output, format, level, compress } => {
            let format = FormatDefinition::new(format);
            let doc = sample_document(compress);
            let options = EncodeOptions { compression_level: level, ..EncodeOptions::default() };
            let bytes = format.encode_with(&doc, &options)?;
            storage.write(&locator(&output)?, &bytes)?;
            println!("Created: {} ({} B)", output.display(), bytes.len());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn locator(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| format!("path is not valid UTF-8: {}", path.display()).into())
}

fn load_definition(storage: &dyn Storage, path: &Path) -> Result<FormatSpec, Box<dyn std::error::Error>> {
    let text = String::from_utf8(storage.read(&locator(path)?)?)?;
    Ok(FormatSpec::from_json(&text)?)
}

fn print_map(map: &Map) {
    for (key, value) in map.iter() {
        println!("    {:<18} {}", key, stringify_value(value));
    }
}

fn dump(doc: &Document) {
    for (i, (content_type, entry)) in doc.entries().enumerate() {
        let kind = match &entry.content {
            ContentValue::Bytes(_) => "bytes",
            ContentValue::Text(_) => "text",
            ContentValue::Structured(_) => "structured",
        };
        println!(
            "#{:<3} <{}> {}{}",
            i,
            content_type,
            kind,
            if entry.flags.compressed { ", deflate" } else { "" }
        );
        if !entry.headers.is_empty() {
            println!("  headers  {}", stringify_value(&Value::Map(entry.headers.clone())));
        }
        match &entry.content {
            ContentValue::Bytes(bytes) => println!("  {} B  {}", bytes.len(), hex::encode(bytes)),
            ContentValue::Text(text) => println!("  {}", text),
            ContentValue::Structured(Value::Map(map)) => print!("{}", indent(&stringify(map))),
            ContentValue::Structured(other) => println!("  {}", stringify_value(other)),
        }
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {}\n", line)).collect()
}

fn sample_document(compress: bool) -> Document {
    let mut doc = Document::with_headers(
        Map::from([
            ("title", Value::from("Some great title")),
            ("author", Value::from("Bob")),
        ]),
        Map::new(),
    );
    doc.add_content("txt", "test test test", Map::new(), ContentFlags::NONE);
    doc.add_content(
        "meta",
        Map::from([
            ("description", Value::from("Photo of Paris at night")),
            ("date", Value::from(chrono::Utc::now())),
        ]),
        Map::new(),
        ContentFlags::NONE,
    );
    let flags = if compress { ContentFlags::COMPRESSED } else { ContentFlags::NONE };
    doc.add_content("data", vec![0x43u8, 0x10, 0x56, 0xaf], Map::new(), flags);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsgff::MemoryStorage;

    #[test]
    fn definitions_load_through_storage() {
        let storage = MemoryStorage::new();
        storage
            .write("image.json", br#"{ "formatCodeName": "image", "mandatoryContents": ["pixels"] }"#)
            .unwrap();
        let spec = load_definition(&storage, Path::new("image.json")).unwrap();
        assert_eq!(FormatDefinition::from(spec).code_name(), "image");

        assert!(load_definition(&storage, Path::new("missing.json")).is_err());
        storage.write("binary.json", &[0xff, 0xfe]).unwrap();
        assert!(load_definition(&storage, Path::new("binary.json")).is_err());
    }
}
