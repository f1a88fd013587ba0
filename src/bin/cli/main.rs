use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use enmark::enex::{self, EnexNote};

#[derive(Parser)]
#[command(name = "enmark", about = "Convert Evernote .enex exports to Markdown", version)]
struct Cli {
    /// Path to the .enex export file
    enex: PathBuf,

    /// Write one Markdown file per note into this directory
    /// (default: print all notes to stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print a JSON preview of the export without converting
    #[arg(long)]
    preview: bool,
}

/// Turn a note title into a safe file name
fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned
    }
}

/// Pick a non-colliding path for a note inside the output directory
fn note_path(dir: &Path, title: &str) -> PathBuf {
    let base = sanitize_filename(title);
    let mut path = dir.join(format!("{base}.md"));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{base} ({counter}).md"));
        counter += 1;
    }
    path
}

fn write_note(dir: &Path, note: &EnexNote) -> anyhow::Result<()> {
    let markdown = enex::note_to_markdown(note)
        .with_context(|| format!("failed to convert note '{}'", note.title))?;

    let path = note_path(dir, &note.title);
    fs::write(&path, markdown.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if !note.resources.is_empty() {
        let resource_dir = dir.join("resources");
        fs::create_dir_all(&resource_dir)?;
        for resource in &note.resources {
            if resource.entity.id.is_empty() || resource.data.is_empty() {
                continue;
            }
            let name = if resource.entity.filename.is_empty() {
                resource.entity.id.clone()
            } else {
                sanitize_filename(&resource.entity.filename)
            };
            let resource_path = resource_dir.join(format!("{}-{}", resource.entity.id, name));
            fs::write(&resource_path, &resource.data)
                .with_context(|| format!("failed to write {}", resource_path.display()))?;
        }
    }

    println!("{}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let content = fs::read_to_string(&cli.enex)
        .with_context(|| format!("failed to read {}", cli.enex.display()))?;

    if cli.preview {
        let preview = enex::preview_enex(&content)?;
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let notes = enex::parse_enex(&content)?;
    log::info!("Parsed {} notes from {}", notes.len(), cli.enex.display());

    match cli.output {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            for note in &notes {
                write_note(&dir, note)?;
            }
        }
        None => {
            for (i, note) in notes.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("# {}\n", note.title);
                let markdown = enex::note_to_markdown(note)
                    .with_context(|| format!("failed to convert note '{}'", note.title))?;
                println!("{markdown}");
            }
        }
    }

    Ok(())
}
