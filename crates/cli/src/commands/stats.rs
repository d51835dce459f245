use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use plex_core::{
    Action, Arguments, BoxError, Chain, Produced, Run, RunConfig, RunResult, StructuralError,
    activate,
};
use plex_reporting::Progress;
use serde_json::{Value, json};

pub const RUN_NAME: &str = "stats";

/// Declares the `stats` run: the entry lists the files under `paths`
/// (directories are read one level deep) whose extension matches `ext`,
/// and the action counts bytes, lines and words of each file.
pub fn stats_run(config: RunConfig) -> Result<Run, StructuralError> {
    Run::builder(RUN_NAME)
        .config(config)
        .parameter("paths", json!(["."]))
        .parameter("ext", Value::Null)
        .parameter("sequential", false)
        .argument("ext", normalize_extension)
        .entry(collect_files)
        .action(Action::new("count", |item, _| file_stats(item)))
        .build()
}

/// `".RS"`, `"rs"` and `"Rs"` all select `rs` files.
fn normalize_extension(value: Value) -> Result<Value, BoxError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(ext) => {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            Ok(if ext.is_empty() {
                Value::Null
            } else {
                Value::String(ext)
            })
        }
        other => Err(format!("extension must be a string, got {other}").into()),
    }
}

async fn collect_files(arguments: Arguments) -> Result<Produced, BoxError> {
    let paths: Vec<PathBuf> = arguments.get_as("paths")?;
    let ext: Option<String> = arguments.get_as("ext")?;
    let sequential: bool = arguments.get_as("sequential")?;

    let files = list_files(&paths, ext.as_deref()).await?;
    tracing::info!(files = files.len(), sequential, "collected files");

    let progress = Arc::new(Progress::labelled(RUN_NAME, files.len()));
    let activation = activate(Chain::new().with_shared(progress))?;

    let items = files
        .into_iter()
        .map(|path| Value::String(path.display().to_string()));
    let produced = if sequential {
        Produced::incremental(futures::stream::iter(items.map(Ok::<_, BoxError>)))
    } else {
        Produced::items(items)
    };

    Ok(produced.within(activation))
}

pub async fn list_files(paths: &[PathBuf], ext: Option<&str>) -> Result<Vec<PathBuf>, BoxError> {
    let mut files = Vec::new();
    for path in paths {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_file() {
            if matches_extension(path, ext) {
                files.push(path.clone());
            }
            continue;
        }

        let mut entries = tokio::fs::read_dir(path).await?;
        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            if entry.file_type().await?.is_file() && matches_extension(&entry_path, ext) {
                listed.push(entry_path);
            }
        }
        listed.sort();
        files.extend(listed);
    }
    Ok(files)
}

fn matches_extension(path: &Path, ext: Option<&str>) -> bool {
    match ext {
        None => true,
        Some(ext) => path
            .extension()
            .and_then(|found| found.to_str())
            .is_some_and(|found| found.eq_ignore_ascii_case(ext)),
    }
}

async fn file_stats(item: Value) -> Result<Value, BoxError> {
    let path = item.as_str().ok_or("item is not a file path")?;
    let contents = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&contents);

    Ok(json!({
        "file": path,
        "bytes": contents.len(),
        "lines": text.lines().count(),
        "words": text.split_whitespace().count(),
    }))
}

/// One JSON line per outcome; failures render as `{"index", "error"}`.
pub fn render(result: &RunResult) -> Vec<String> {
    match result {
        RunResult::Overridden(value) => vec![value.to_string()],
        _ => result
            .outcomes()
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(value) => value.to_string(),
                Err(error) => {
                    json!({ "index": outcome.index, "error": error.to_string() }).to_string()
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plex_core::Invocation;
    use std::fs;

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("b.RS"), "one two\nthree\n").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.rs"), "skipped\n").unwrap();
        dir
    }

    fn path_arg(dir: &tempfile::TempDir) -> Value {
        json!([dir.path().display().to_string()])
    }

    #[test]
    fn extension_is_normalized() {
        assert_eq!(normalize_extension(json!(".RS")).unwrap(), json!("rs"));
        assert_eq!(normalize_extension(json!("  ")).unwrap(), Value::Null);
        assert_eq!(normalize_extension(Value::Null).unwrap(), Value::Null);
        assert!(normalize_extension(json!(3)).is_err());
    }

    #[tokio::test]
    async fn lists_one_level_filtered_by_extension() {
        let dir = sample_dir();

        let files = list_files(&[dir.path().to_path_buf()], Some("rs")).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name()?.to_str())
            .collect();

        assert_eq!(names, ["a.rs", "b.RS"]);
    }

    #[tokio::test]
    async fn counts_each_file_in_parallel() {
        let dir = sample_dir();
        let run = stats_run(RunConfig::new(RUN_NAME)).unwrap();

        let result = run
            .invoke(Invocation::new().arg("paths", path_arg(&dir)).arg("ext", ".rs"))
            .await
            .unwrap();

        let value = result.into_value().unwrap();
        assert_eq!(value[0]["lines"], json!(1));
        assert_eq!(value[1]["words"], json!(3));
        assert_eq!(value[1]["bytes"], json!(14));
    }

    #[tokio::test]
    async fn sequential_mode_processes_listed_files() {
        let dir = sample_dir();
        let run = stats_run(RunConfig::new(RUN_NAME)).unwrap();

        let result = run
            .invoke(
                Invocation::new()
                    .arg("paths", path_arg(&dir))
                    .arg("ext", "md")
                    .arg("sequential", true),
            )
            .await
            .unwrap();

        let lines = render(&result);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("notes.md"));
    }

    #[test]
    fn failures_render_with_their_index() {
        let result = RunResult::Batch(vec![plex_core::Outcome::new(
            4,
            Err(plex_core::ItemError::Cancelled),
        )]);

        let lines = render(&result);
        let rendered: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(rendered["index"], json!(4));
        assert_eq!(rendered["error"], json!("item processing was cancelled"));
    }
}
