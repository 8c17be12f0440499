use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use todolist::{
    Config, Filter, KeyValueStore, Scheduler, SystemScheduler, TaskError, TaskId, TaskItem, TaskList, jsonl,
    open_backend, task_error,
};
use tracing::Level;

type Store = TaskList<Box<dyn KeyValueStore>, SystemScheduler>;

#[derive(Parser)]
#[command(name = "todolist")]
#[command(about = "todolist CLI - Ordered to-do list with undoable deletes")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config_dir>/todolist/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task database (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show tasks
    List {
        /// all, completed or uncompleted
        #[arg(short, long, default_value_t = Filter::All)]
        filter: Filter,

        /// Include ids and creation times
        #[arg(short, long)]
        long: bool,
    },

    /// Mark a task done, or not done again
    Toggle { id: TaskId },

    /// Change the text of a task
    Edit {
        id: TaskId,
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Delete a task
    Rm { id: TaskId },

    /// Move the task at row FROM to row TO, as numbered by `list`
    Mv {
        from: usize,
        to: usize,

        /// Rows are numbered within this view
        #[arg(short, long, default_value_t = Filter::All)]
        filter: Filter,
    },

    /// Write all tasks to a JSONL file
    Export {
        file: PathBuf,

        /// Append to the file instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Replace all tasks with the contents of a JSONL file
    Import { file: PathBuf },

    /// Interactive session with undo and edit mode
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let storage = open_backend(config.backend, &config.data_dir())?;
    let mut list: Store = TaskList::open_with(storage, SystemScheduler::new(), config.store_options())?;

    match cli.command {
        Commands::Add { text } => match list.add(&text.join(" "))? {
            Some(id) => println!("Added task {}", id),
            None => println!("Nothing to add"),
        },
        Commands::List { filter, long } => render(&list, filter, long),
        Commands::Toggle { id } => {
            if !list.toggle_complete(id)? {
                println!("{}", TaskError::NotFound(id).to_string().yellow());
            }
        }
        Commands::Edit { id, text } => {
            let Some(current) = list.get(id).map(|t| t.text.clone()) else {
                return Err(TaskError::NotFound(id).into());
            };
            let item = TaskItem::new(id).begin_edit(&current).set_buffer(text.join(" "));
            let item = item.commit(&mut list)?;
            if let Some(err) = item.error() {
                return Err(err.clone().into());
            }
            println!("Updated task {}", id);
        }
        Commands::Rm { id } => {
            if list.delete(id)? {
                println!("Deleted task {}", id);
            } else {
                println!("{}", TaskError::NotFound(id).to_string().yellow());
            }
        }
        Commands::Mv { from, to, filter } => {
            list.reorder_visible(filter, row_index(from)?, row_index(to)?)?;
            render(&list, filter, false);
        }
        Commands::Export { file, append } => {
            if append {
                for task in list.tasks() {
                    jsonl::append_jsonl(&file, task)?;
                }
            } else {
                jsonl::write_jsonl(&file, list.tasks())?;
            }
            println!("Exported {} tasks to {}", list.len(), file.display());
        }
        Commands::Import { file } => {
            let tasks = jsonl::read_jsonl(&file)?;
            list.replace_all(tasks)?;
            println!("Imported {} tasks from {}", list.len(), file.display());
        }
        Commands::Shell => Session::new(list).run()?,
    }

    Ok(())
}

/// Convert a 1-based row number to a list index
fn row_index(row: usize) -> Result<usize> {
    row.checked_sub(1).ok_or_else(|| eyre!("Rows are numbered from 1"))
}

fn render<S: KeyValueStore, T: Scheduler>(list: &TaskList<S, T>, filter: Filter, long: bool) {
    let bar: Vec<String> = Filter::ALL
        .iter()
        .map(|f| {
            if *f == filter {
                format!("[{}]", f.label()).bold().to_string()
            } else {
                format!(" {} ", f.label())
            }
        })
        .collect();
    println!("{}", bar.join(" "));

    let mut shown = 0;
    for (row, task) in list.filtered_view(filter).enumerate() {
        shown += 1;
        let mark = if task.is_completed { "[x]".green() } else { "[ ]".normal() };
        let text = if task.is_completed {
            task.text.dimmed().strikethrough()
        } else {
            task.text.normal()
        };

        if long {
            let created = task
                .id
                .created_at()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("{:>3}. {} {}  {}", row + 1, mark, text, format!("#{} {}", task.id, created).dimmed());
        } else {
            println!("{:>3}. {} {}", row + 1, mark, text);
        }
    }

    if shown == 0 {
        println!("{}", "  (no tasks)".dimmed());
    }

    if let Some(task) = list.pending_undo() {
        println!("{} {}", format!("Deleted \"{}\".", task.text).yellow(), "Type `undo` to restore it.".dimmed());
    }
}

/// Line-oriented event loop over one open task list
struct Session<S: KeyValueStore, T: Scheduler> {
    list: TaskList<S, T>,
    filter: Filter,
    editing: Option<TaskItem>,
}

impl<S: KeyValueStore, T: Scheduler> Session<S, T> {
    fn new(list: TaskList<S, T>) -> Self {
        Self {
            list,
            filter: Filter::All,
            editing: None,
        }
    }

    fn run(mut self) -> Result<()> {
        println!("todolist shell - type `help` for commands");
        render(&self.list, self.filter, false);

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("{} ", if self.editing.is_some() { "edit>" } else { ">" });
            io::stdout().flush()?;

            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;

            if let Some(task) = self.list.expire_pending() {
                println!("{}", format!("\"{}\" can no longer be restored", task.text).dimmed());
            }

            let (command, rest) = match line.trim().split_once(' ') {
                Some((command, rest)) => (command, rest.trim()),
                None => (line.trim(), ""),
            };
            if matches!(command, "quit" | "exit" | "q") {
                break;
            }

            if let Err(e) = self.dispatch(command, rest) {
                match task_error(&e) {
                    Some(err) => println!("{}", err.to_string().yellow()),
                    None => println!("{} {:#}", "Error:".red(), e),
                }
            }
        }

        Ok(())
    }

    fn dispatch(&mut self, command: &str, rest: &str) -> Result<()> {
        match command {
            "" => {}
            "help" | "?" => print_help(),
            "ls" | "list" => render(&self.list, self.filter, rest == "-l"),
            "filter" => {
                self.filter = rest.parse()?;
                render(&self.list, self.filter, false);
            }
            "add" => {
                if self.list.add(rest)?.is_some() {
                    render(&self.list, self.filter, false);
                }
            }
            "toggle" | "done" => {
                let id = self.row_id(rest)?;
                self.list.toggle_complete(id)?;
                render(&self.list, self.filter, false);
            }
            "rm" | "delete" => {
                let id = self.row_id(rest)?;
                if self.editing.as_ref().is_some_and(|item| item.id() == id) {
                    self.editing = None;
                }
                self.list.delete(id)?;
                render(&self.list, self.filter, false);
            }
            "undo" => match self.list.undo_delete()? {
                Some(_) => render(&self.list, self.filter, false),
                None => println!("{}", "Nothing to undo".dimmed()),
            },
            "mv" => {
                let (from, to) = rest
                    .split_once(' ')
                    .ok_or_else(|| eyre!("Usage: mv <from-row> <to-row>"))?;
                let from = row_index(from.trim().parse()?)?;
                let to = row_index(to.trim().parse()?)?;
                self.list.reorder_visible(self.filter, from, to)?;
                render(&self.list, self.filter, false);
            }
            "edit" => {
                if let Some(item) = &self.editing {
                    return Err(eyre!(
                        "Already editing task {}; `save` or `cancel` first",
                        item.id()
                    ));
                }
                let id = self.row_id(rest)?;
                let current = self.list.get(id).map(|t| t.text.clone()).unwrap_or_default();
                let item = TaskItem::new(id).begin_edit(&current);
                println!("Editing: {}", current);
                println!("{}", "Use `type <text>`, then `save` or `cancel`".dimmed());
                self.editing = Some(item);
            }
            "type" => {
                let item = self.editing.take().ok_or_else(|| eyre!("Not editing a task"))?;
                self.editing = Some(item.set_buffer(rest));
            }
            "save" => {
                let item = self.editing.take().ok_or_else(|| eyre!("Not editing a task"))?;
                let item = item.commit(&mut self.list)?;
                if let Some(err) = item.error() {
                    println!("{}", err.to_string().yellow());
                    self.editing = Some(item);
                } else {
                    render(&self.list, self.filter, false);
                }
            }
            "cancel" => {
                if self.editing.take().is_some() {
                    println!("{}", "Edit cancelled".dimmed());
                }
            }
            other => println!("Unknown command `{}`; type `help`", other),
        }

        Ok(())
    }

    /// Id of the task shown at 1-based `row` in the current view
    fn row_id(&self, row: &str) -> Result<TaskId> {
        let row: usize = row.parse().map_err(|_| eyre!("Expected a row number, got `{}`", row))?;
        let index = row_index(row)?;
        self.list
            .filtered_view(self.filter)
            .nth(index)
            .map(|task| task.id)
            .ok_or_else(|| eyre!("No task at row {}", row))
    }
}

fn print_help() {
    println!("  add <text>          add a task");
    println!("  ls [-l]             show tasks in the current view");
    println!("  filter <name>       all, completed or uncompleted");
    println!("  toggle <row>        mark done / not done");
    println!("  edit <row>          start editing; then `type <text>`, `save` or `cancel`");
    println!("  rm <row>            delete (restorable with `undo` for a few seconds)");
    println!("  undo                restore the last deleted task");
    println!("  mv <from> <to>      move a task within the current view");
    println!("  quit                leave the shell");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use todolist::{ManualScheduler, MemoryStorage};

    fn session_with(items: &[&str]) -> Session<MemoryStorage, ManualScheduler> {
        let mut list = TaskList::open(MemoryStorage::new(), ManualScheduler::new()).unwrap();
        for item in items {
            list.add(item).unwrap();
        }
        Session::new(list)
    }

    fn texts(session: &Session<MemoryStorage, ManualScheduler>) -> Vec<&str> {
        session.list.tasks().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_row_id_is_one_based_within_view() {
        let mut session = session_with(&["A", "B", "C"]);
        let ids: Vec<TaskId> = session.list.tasks().iter().map(|t| t.id).collect();

        assert_eq!(session.row_id("1").unwrap(), ids[0]);
        assert_eq!(session.row_id("3").unwrap(), ids[2]);
        assert!(session.row_id("0").is_err());
        assert!(session.row_id("4").is_err());
        assert!(session.row_id("two").is_err());

        session.dispatch("toggle", "2").unwrap();
        session.dispatch("filter", "uncompleted").unwrap();
        assert_eq!(session.row_id("2").unwrap(), ids[2]);
    }

    #[test]
    fn test_rm_clears_edit_of_deleted_row() {
        let mut session = session_with(&["A", "B"]);
        session.dispatch("edit", "2").unwrap();
        assert!(session.editing.is_some());

        session.dispatch("rm", "2").unwrap();
        assert!(session.editing.is_none());
        assert_eq!(texts(&session), vec!["A"]);

        session.dispatch("undo", "").unwrap();
        assert_eq!(texts(&session), vec!["A", "B"]);
    }

    #[test]
    fn test_rm_keeps_edit_of_other_row() {
        let mut session = session_with(&["A", "B"]);
        session.dispatch("edit", "1").unwrap();
        session.dispatch("rm", "2").unwrap();
        assert!(session.editing.is_some());
    }

    #[test]
    fn test_blank_save_stays_editing_until_fixed() {
        let mut session = session_with(&["Buy milk"]);
        session.dispatch("edit", "1").unwrap();
        session.dispatch("type", "   ").unwrap();
        session.dispatch("save", "").unwrap();

        let item = session.editing.as_ref().unwrap();
        assert_eq!(item.error(), Some(&TaskError::EmptyInput));
        assert_eq!(texts(&session), vec!["Buy milk"]);

        session.dispatch("type", "Buy oat milk").unwrap();
        session.dispatch("save", "").unwrap();
        assert!(session.editing.is_none());
        assert_eq!(texts(&session), vec!["Buy oat milk"]);

        // Editing can start again once the previous edit is saved
        session.dispatch("edit", "1").unwrap();
        assert_eq!(session.editing.as_ref().unwrap().buffer(), Some("Buy oat milk"));
    }

    #[test]
    fn test_second_edit_is_refused() {
        let mut session = session_with(&["A", "B"]);
        session.dispatch("edit", "1").unwrap();
        session.dispatch("type", "A typed").unwrap();

        assert!(session.dispatch("edit", "2").is_err());
        let item = session.editing.as_ref().unwrap();
        assert_eq!(item.buffer(), Some("A typed"));

        session.dispatch("cancel", "").unwrap();
        session.dispatch("edit", "2").unwrap();
        assert_eq!(session.editing.as_ref().unwrap().buffer(), Some("B"));
    }

    #[test]
    fn test_mv_uses_view_rows() {
        let mut session = session_with(&["A", "B", "C"]);
        session.dispatch("mv", "1 3").unwrap();
        assert_eq!(texts(&session), vec!["B", "C", "A"]);

        assert!(session.dispatch("mv", "0 1").is_err());
        assert!(session.dispatch("mv", "1").is_err());
        assert_eq!(texts(&session), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_undo_after_window() {
        let mut session = session_with(&["A"]);
        session.dispatch("rm", "1").unwrap();
        session.list.scheduler_mut().advance(Duration::from_secs(3));

        session.dispatch("undo", "").unwrap();
        assert!(session.list.is_empty());
    }
}
