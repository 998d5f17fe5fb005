use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{info, warn};

use crate::config::{Config, get_data_dir};
use crate::search::{FileToIndex, SearchEngine, SearchRequest};

/// Directories never worth indexing.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", ".git", "__pycache__"];

fn load_config() -> Result<Config> {
    let data_dir = get_data_dir().context("Failed to resolve data directory")?;
    Config::load(data_dir)
}

/// Write the default config file, or print the current one.
#[inline]
pub fn run_config(show: bool) -> Result<()> {
    let config = load_config()?;

    if show {
        let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
        println!("# {}", config.config_file_path().display());
        print!("{rendered}");
        return Ok(());
    }

    config.save()?;
    println!("Wrote {}", config.config_file_path().display());
    Ok(())
}

/// Index one file or a directory tree into a project.
#[inline]
pub async fn index_path(path: &Path, project_id: &str, language: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let engine = SearchEngine::new(&config).await?;

    let mut paths = Vec::new();
    collect_source_files(path, &mut paths)
        .with_context(|| format!("Failed to scan {}", path.display()))?;

    if paths.is_empty() {
        println!("No files found under {}", path.display());
        return Ok(());
    }

    let mut files = Vec::with_capacity(paths.len());
    for file_path in paths {
        let content = match std::fs::read_to_string(&file_path) {
            Ok(content) => content,
            Err(error) => {
                warn!("Skipping unreadable file {}: {error}", file_path.display());
                continue;
            }
        };

        let file_language = language
            .map(str::to_string)
            .or_else(|| detect_language(&file_path).map(str::to_string));
        let Some(file_language) = file_language else {
            warn!(
                "Skipping {}: unknown language (pass --language to force one)",
                file_path.display()
            );
            continue;
        };

        files.push(FileToIndex {
            file_path: file_path.to_string_lossy().into_owned(),
            content,
            language: file_language,
            project_id: project_id.to_string(),
            metadata: serde_json::Map::new(),
        });
    }

    info!("Indexing {} files into project {project_id}", files.len());

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("Invalid progress template")?,
    );

    let mut successful = 0;
    let mut failed = 0;
    for file in &files {
        progress.set_message(file.file_path.clone());
        let report = engine.batch_index_files(std::slice::from_ref(file)).await;
        successful += report.successful;
        failed += report.failed;
        for reason in report.errors {
            progress.println(reason);
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    println!("Indexed {successful} files into {project_id} ({failed} failed)");
    Ok(())
}

/// Run one semantic search and print the ranked results.
#[inline]
pub async fn run_search(
    query: &str,
    project_id: Option<String>,
    language: Option<String>,
    limit: usize,
    threshold: f32,
) -> Result<()> {
    let config = load_config()?;
    let engine = SearchEngine::new(&config).await?;

    let request = SearchRequest {
        query: query.to_string(),
        project_id,
        language,
        limit,
        threshold,
    };
    let response = engine.search(&request).await?;

    if response.results.is_empty() {
        println!("No results");
        return Ok(());
    }

    println!("{} results", response.total);
    for hit in &response.results {
        println!(
            "\n{:.3}  {} [{}] chunk {}",
            hit.similarity, hit.payload.file_path, hit.payload.language, hit.payload.chunk_index
        );
        if let Some(function_name) = &hit.payload.function_name {
            println!("       {function_name}");
        }
        for line in hit.payload.content.lines().take(8) {
            println!("    {line}");
        }
    }

    Ok(())
}

/// Print stats for one project, or for the whole store.
#[inline]
pub async fn show_stats(project_id: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let engine = SearchEngine::new(&config).await?;

    if let Some(project_id) = project_id {
        let stats = engine.get_project_stats(project_id).await?;
        println!("Project {project_id}");
        println!("  Records: {}", stats.record_count);
        println!("  Languages: {}", stats.distinct_languages);
        println!("  Characters: {}", stats.total_characters);
        if let Some(last_modified) = stats.last_modified {
            println!("  Last indexed: {last_modified}");
        }
        return Ok(());
    }

    let stats = engine.get_all_stats().await?;
    println!("Total records: {}", stats.total_records);
    println!(
        "Languages: {}",
        stats
            .languages
            .iter()
            .map(|(language, count)| format!("{language} ({count})"))
            .join(", ")
    );
    println!(
        "Projects: {}",
        stats
            .projects
            .iter()
            .map(|(project, count)| format!("{project} ({count})"))
            .join(", ")
    );

    Ok(())
}

/// Delete every record belonging to a project.
#[inline]
pub async fn delete_project(project_id: &str) -> Result<()> {
    let config = load_config()?;
    let engine = SearchEngine::new(&config).await?;

    if engine.delete_project(project_id).await {
        println!("Deleted project {project_id}");
        Ok(())
    } else {
        anyhow::bail!("Failed to delete project {project_id}")
    }
}

fn collect_source_files(path: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if entry_path.is_dir() {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect_source_files(&entry_path, files)?;
        } else {
            files.push(entry_path);
        }
    }

    Ok(())
}

fn detect_language(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?;
    let language = match extension {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        _ => return None,
    };
    Some(language)
}
