use crate::index::reader::IndexReader;
use crate::index::types::SearchField;
use crate::utils::{get_index_dir, list_indexed_roots};
use anyhow::Result;
use std::path::Path;

/// Display index statistics
pub fn show_stats(root_path: &Path, index_dir: Option<&Path>) -> Result<()> {
    let root = root_path.canonicalize()?;
    let index_dir = match index_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_index_dir(&root)?,
    };
    let reader = IndexReader::open(&index_dir)?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Root path:        {}", reader.meta.root_path.display());
    println!("Index location:   {}", reader.index_dir().display());
    println!("Index version:    {}", reader.meta.version);
    println!("Document count:   {}", reader.meta.doc_count);
    println!("Generation:       {}", reader.meta.generation);
    println!("Segment count:    {}", reader.meta.segments.len());

    // Documents per repository
    let mut repo_counts = std::collections::HashMap::new();
    for stored in reader.documents() {
        *repo_counts.entry(stored.doc.repository.as_str()).or_insert(0u64) += 1;
    }

    println!();
    println!("Documents by repository:");
    let mut sorted: Vec<_> = repo_counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    for (repo, count) in sorted {
        println!("  {:20} {}", repo, count);
    }

    println!();
    println!("Distinct terms by field:");
    for field in SearchField::ALL {
        println!("  {:20} {}", field.file_stem(), reader.term_count(field));
    }

    if let Ok(size) = dir_size(&index_dir) {
        println!();
        println!("Index size:       {}", format_size(size));
    }

    println!();
    println!("Created:          {}", format_timestamp(reader.meta.created_at));
    println!("Updated:          {}", format_timestamp(reader.meta.updated_at));

    Ok(())
}

/// List all indexed roots
pub fn list_indexes() -> Result<()> {
    let roots = list_indexed_roots()?;

    if roots.is_empty() {
        println!("No indexed repositories found.");
        return Ok(());
    }

    println!("Indexed Roots");
    println!("=============");
    println!();

    for (root, index_dir) in roots {
        let status = if root.exists() { "" } else { " [missing]" };
        println!("  {}{}", root.display(), status);
        println!("    Index: {}", index_dir.display());
        println!();
    }

    Ok(())
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                size += entry.metadata()?.len();
            } else if path.is_dir() {
                size += dir_size(&path)?;
            }
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_timestamp(ts: u64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}
