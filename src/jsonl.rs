// JSONL export and import of task lists

use crate::task::{Task, TaskId};
use eyre::{Context, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Write `tasks` to `path`, one JSON object per line, replacing the file
pub fn write_jsonl(path: &Path, tasks: &[Task]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .context("Failed to open JSONL file for writing")?;

    // Truncate only once the lock is held
    file.lock_exclusive().context("Failed to acquire file lock")?;
    file.set_len(0).context("Failed to truncate JSONL file")?;

    let mut writer = BufWriter::new(&file);
    for task in tasks {
        let json = serde_json::to_string(task)?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()?;
    drop(writer);
    file.sync_all()?; // Ensure data is flushed to disk

    info!(file = ?path, count = tasks.len(), "Exported tasks to JSONL");
    Ok(())
}

/// Append one task to a JSONL file
pub fn append_jsonl(path: &Path, task: &Task) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    file.lock_exclusive().context("Failed to acquire file lock")?;

    let json = serde_json::to_string(task)?;
    writeln!(file, "{}", json)?;
    file.sync_all()?;

    Ok(())
}

/// Read tasks from a JSONL file in file order
///
/// Blank and malformed lines are skipped with a warning. When an id shows up
/// again, the later line replaces the earlier task in place. A missing file
/// is an error.
pub fn read_jsonl(path: &Path) -> Result<Vec<Task>> {
    let file = File::open(path).with_context(|| format!("Failed to open JSONL file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut tasks: Vec<Task> = Vec::new();
    let mut positions: HashMap<TaskId, usize> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let task: Task = match serde_json::from_str(&line) {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        match positions.get(&task.id) {
            Some(&index) => tasks[index] = task,
            None => {
                positions.insert(task.id, tasks.len());
                tasks.push(task);
            }
        }
    }

    info!(file = ?path, count = tasks.len(), "Loaded tasks from JSONL");

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_jsonl() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("tasks.jsonl");

        let tasks = vec![Task::new(TaskId(1), "Buy milk"), Task::new(TaskId(2), "Wash car")];
        write_jsonl(&jsonl_path, &tasks).unwrap();

        let content = fs::read_to_string(&jsonl_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"id":1,"text":"Buy milk","isCompleted":false}"#);

        // Rewriting replaces the previous export
        write_jsonl(&jsonl_path, &tasks[..1]).unwrap();
        assert_eq!(read_jsonl(&jsonl_path).unwrap().len(), 1);
    }

    #[test]
    fn test_read_jsonl_later_line_wins() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("tasks.jsonl");

        let mut revised = Task::new(TaskId(1), "Version 2");
        revised.is_completed = true;

        append_jsonl(&jsonl_path, &Task::new(TaskId(1), "Version 1")).unwrap();
        append_jsonl(&jsonl_path, &Task::new(TaskId(2), "Other")).unwrap();
        append_jsonl(&jsonl_path, &revised).unwrap();

        let tasks = read_jsonl(&jsonl_path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], revised);
        assert_eq!(tasks[1].text, "Other");
    }

    #[test]
    fn test_read_jsonl_nonexistent_file() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("nonexistent.jsonl");

        let err = read_jsonl(&jsonl_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open JSONL file"));
    }

    #[test]
    fn test_write_jsonl_shrinks_longer_file() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("tasks.jsonl");
        fs::write(&jsonl_path, "x".repeat(4096)).unwrap();

        write_jsonl(&jsonl_path, &[Task::new(TaskId(1), "short")]).unwrap();

        let content = fs::read_to_string(&jsonl_path).unwrap();
        assert_eq!(content, "{\"id\":1,\"text\":\"short\",\"isCompleted\":false}\n");
    }

    #[test]
    fn test_read_jsonl_malformed_line() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("tasks.jsonl");

        fs::write(
            &jsonl_path,
            r#"{"id":1,"text":"Valid","isCompleted":false}
{malformed json}

{"id":2,"text":"Also Valid","isCompleted":true}
"#,
        )
        .unwrap();

        let tasks = read_jsonl(&jsonl_path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, TaskId(1));
        assert!(tasks[1].is_completed);
    }
}
