//! Interactive REPL (Read-Eval-Print Loop) mode.

use crate::cli::{parse_assignment, ModelArgs};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use powerscope_domain::{attribs, Attribs, Model, Output, Range, Solver, OUTPUT_KEY};
use powerscope_drag::{DragController, DragTarget, Handle, LinearScale};
use powerscope_pipeline::{Edit, PipelineConfig, PipelineHandle, UpdatePipeline};
use powerscope_project::{PlotSlot, Project, ProjectEvent};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Run the interactive REPL.
pub async fn run_repl<S: Solver>(
    args: &ModelArgs,
    solver: S,
    config: PipelineConfig,
    formatter: &Formatter,
) -> Result<()> {
    println!("{}", formatter.info("Powerscope REPL - Type 'help' for commands, 'exit' to quit"));
    println!();

    let mut editor = DefaultEditor::new().map_err(|e| {
        CliError::Io(std::io::Error::other(format!("Failed to initialize editor: {}", e)))
    })?;
    let history_path = get_history_path()?;
    let _ = editor.load_history(&history_path);

    let (pipeline, task) = UpdatePipeline::spawn(Project::new(args.kind), solver, config);
    let mut events = pipeline.subscribe();
    pipeline.add_model(args.to_model()?).await?;

    loop {
        report_events(&mut events, formatter);

        match editor.readline("powerscope> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match parse_repl_command(line) {
                    Ok(ReplCommand::Exit) => {
                        println!("{}", formatter.info("Goodbye!"));
                        break;
                    }
                    Ok(ReplCommand::Help) => print_help(formatter),
                    Ok(command) => {
                        if let Err(e) = execute_repl_command(command, &pipeline, args, formatter).await {
                            eprintln!("{}", formatter.error(&e.to_string()));
                        }
                    }
                    Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'exit' to quit"));
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", formatter.error(&format!("Error: {}", err)));
                break;
            }
        }
    }

    editor.save_history(&history_path).ok();
    pipeline.shutdown()?;
    let _ = task.await;
    Ok(())
}

/// REPL command type.
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Exit,
    Help,
    Set { model: usize, changes: Attribs },
    Slide { model: usize, changes: Attribs },
    Output(Output),
    Add(Attribs),
    Remove(usize),
    Select(usize),
    Drag { handle: Handle, to: f64 },
    SetRange { slot: PlotSlot, range: Range },
    AutoRange,
    Show,
    Metrics,
}

/// Parse a REPL command line.
fn parse_repl_command(line: &str) -> Result<ReplCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        return Err(CliError::InvalidInput("Empty command".to_string()));
    };

    match command {
        "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
        "help" | "?" => Ok(ReplCommand::Help),
        "set" => {
            let (model, changes) = parse_edit(args, "set")?;
            Ok(ReplCommand::Set { model, changes })
        }
        "slide" => {
            let (model, changes) = parse_edit(args, "slide")?;
            Ok(ReplCommand::Slide { model, changes })
        }
        "output" => {
            let output = args
                .first()
                .ok_or_else(|| usage("output <n|nByCI|power|delta>"))?
                .parse::<Output>()
                .map_err(CliError::InvalidInput)?;
            Ok(ReplCommand::Output(output))
        }
        "add" => Ok(ReplCommand::Add(parse_assignments(args)?)),
        "remove" => Ok(ReplCommand::Remove(parse_index(args.first(), "remove <model>")?)),
        "select" => Ok(ReplCommand::Select(parse_index(args.first(), "select <model>")?)),
        "drag" => {
            let [handle, to] = args else {
                return Err(usage("drag <target|left|right> <value>"));
            };
            let handle = match *handle {
                "target" => Handle::Target,
                "left" => Handle::LeftBound,
                "right" => Handle::RightBound,
                other => return Err(CliError::InvalidInput(format!("Unknown handle: {}", other))),
            };
            Ok(ReplCommand::Drag {
                handle,
                to: parse_number(to)?,
            })
        }
        "range" => {
            let [slot, min, max] = args else {
                return Err(usage("range <topY|topLeftX|topRightX|bottomX> <min> <max>"));
            };
            let slot = match *slot {
                "topY" => PlotSlot::TopY,
                "topLeftX" => PlotSlot::TopLeftX,
                "topRightX" => PlotSlot::TopRightX,
                "bottomX" => PlotSlot::BottomX,
                other => return Err(CliError::InvalidInput(format!("Unknown slot: {}", other))),
            };
            Ok(ReplCommand::SetRange {
                slot,
                range: Range::new(parse_number(min)?, parse_number(max)?),
            })
        }
        "auto" => Ok(ReplCommand::AutoRange),
        "show" => Ok(ReplCommand::Show),
        "metrics" => Ok(ReplCommand::Metrics),
        _ => Err(CliError::InvalidInput(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            command
        ))),
    }
}

/// Execute a REPL command.
async fn execute_repl_command(
    command: ReplCommand,
    pipeline: &PipelineHandle,
    args: &ModelArgs,
    formatter: &Formatter,
) -> Result<()> {
    match command {
        ReplCommand::Set { model, changes } => {
            pipeline.edit_and_wait(Edit::immediate(model, changes)).await?;
        }
        ReplCommand::Slide { model, changes } => {
            pipeline.edit(Edit::delayed(model, changes))?;
        }
        ReplCommand::Output(output) => {
            let change = attribs([(OUTPUT_KEY, output.as_str())]);
            pipeline.edit_and_wait(Edit::immediate(0, change)).await?;
        }
        ReplCommand::Add(overrides) => {
            let base = args.to_model()?;
            let mut values = base.values().clone();
            values.extend(overrides);
            let index = pipeline
                .add_model(Model::new(base.kind(), base.output(), values)?)
                .await?;
            println!("{}", formatter.success(&format!("Added model #{}", index + 1)));
        }
        ReplCommand::Remove(index) => pipeline.remove_model(index).await?,
        ReplCommand::Select(index) => pipeline.select(index).await?,
        ReplCommand::Drag { handle, to } => {
            let project = pipeline.snapshot().await?;
            let target = DragTarget::from_project(&project)
                .ok_or_else(|| CliError::InvalidInput("Nothing to drag".to_string()))?;
            let mut drag = DragController::new(pipeline.clone(), LinearScale::identity());
            drag.drag_start(handle, target)?;
            match drag.drag_move(to)? {
                Some(value) => println!("{}", formatter.info(&format!("Staged {}", value))),
                None => println!("{}", formatter.warning("No interval matched")),
            }
            drag.drag_end()?;
        }
        ReplCommand::SetRange { slot, range } => pipeline.set_range(slot, range)?,
        ReplCommand::AutoRange => pipeline.set_custom_ranges(false)?,
        ReplCommand::Show => {
            let project = pipeline.snapshot().await?;
            println!("{}", formatter.format_project(&project)?);
        }
        ReplCommand::Metrics => {
            println!("{}", pipeline.metrics().await?.summary());
        }
        ReplCommand::Exit | ReplCommand::Help => {}
    }
    Ok(())
}

fn report_events(events: &mut broadcast::Receiver<ProjectEvent>, formatter: &Formatter) {
    loop {
        match events.try_recv() {
            Ok(ProjectEvent::SolverFailed { index, message }) => {
                eprintln!("{}", formatter.warning(&format!("Model #{} rolled back: {}", index + 1, message)));
            }
            Ok(ProjectEvent::EditRejected { index, error }) => {
                eprintln!("{}", formatter.warning(&format!("Edit to model #{} rejected: {}", index + 1, error)));
            }
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
}

fn parse_edit(args: &[&str], command: &str) -> Result<(usize, Attribs)> {
    let Some((first, rest)) = args.split_first() else {
        return Err(usage(&format!("{} <model> key=value [key=value ...]", command)));
    };
    let model = parse_index(Some(first), command)?;
    let changes = parse_assignments(rest)?;
    if changes.is_empty() {
        return Err(usage(&format!("{} <model> key=value [key=value ...]", command)));
    }
    Ok((model, changes))
}

fn parse_assignments(args: &[&str]) -> Result<Attribs> {
    args.iter().map(|arg| parse_assignment(arg)).collect()
}

fn parse_index(arg: Option<&&str>, usage_text: &str) -> Result<usize> {
    arg.and_then(|s| s.parse().ok())
        .ok_or_else(|| usage(usage_text))
}

fn parse_number(s: &str) -> Result<f64> {
    s.parse()
        .map_err(|_| CliError::InvalidInput(format!("Not a number: {}", s)))
}

fn usage(text: &str) -> CliError {
    CliError::InvalidInput(format!("Usage: {}", text))
}

fn get_history_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    let dir = home.join(".powerscope");
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("history.txt"))
}

fn print_help(formatter: &Formatter) {
    println!("{}", formatter.info("Available commands:"));
    println!();
    println!("  set <i> k=v [k=v ...]        - Edit model i and solve now");
    println!("  slide <i> k=v [k=v ...]      - Edit model i after the debounce window");
    println!("  output <n|nByCI|power|delta> - Solve every model for another field");
    println!("  add [k=v ...]                - Add a model");
    println!("  remove <i>                   - Remove model i");
    println!("  select <i>                   - Select model i");
    println!("  drag <target|left|right> <v> - Drag a CI marker of the selected model");
    println!("  range <slot> <min> <max>     - Fix a plot range by hand");
    println!("  auto                         - Go back to automatic ranges");
    println!("  show                         - Show models, ranges and history");
    println!("  metrics                      - Show pipeline counters");
    println!("  help, ?                      - Show this help");
    println!("  exit, quit, q                - Exit REPL");
    println!();
}
