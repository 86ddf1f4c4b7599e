/*
 * Interactive pause/resume/stop for a running translation. A background thread
 * reads lines from stdin and applies them to the run's `RunControl`; it exits at
 * end of input or after a stop.
 */
use crate::core::RunControl;
use std::io::{self, BufRead};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Pause,
    Resume,
    Stop,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(ConsoleCommand::Pause),
        "r" | "resume" => Some(ConsoleCommand::Resume),
        "s" | "stop" => Some(ConsoleCommand::Stop),
        _ => None,
    }
}

pub fn apply_command(command: ConsoleCommand, control: &RunControl) {
    match command {
        ConsoleCommand::Pause => control.pause(),
        ConsoleCommand::Resume => control.resume(),
        ConsoleCommand::Stop => control.stop(),
    }
}

/*
 * Feeds every line of `input` to `control` until a stop is issued or the input
 * ends. Unknown lines are reported and ignored.
 */
pub fn read_commands<R: BufRead>(input: R, control: &RunControl) {
    for line_result in input.lines() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                log::warn!("ConsoleControls: Failed to read from stdin: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(command) => {
                apply_command(command, control);
                if command == ConsoleCommand::Stop {
                    return;
                }
            }
            None => log::warn!(
                "ConsoleControls: Unknown command '{}'. Use p(ause), r(esume) or s(top).",
                line.trim()
            ),
        }
    }
}

/*
 * Starts the stdin reader on a detached thread. The thread is not joined; it ends
 * with the process if the run finishes first.
 */
pub fn spawn_console_controls(control: RunControl) -> io::Result<()> {
    log::info!("ConsoleControls: Type 'p' to pause, 'r' to resume, 's' to stop.");
    thread::Builder::new()
        .name("console-controls".to_string())
        .spawn(move || read_commands(io::stdin().lock(), &control))?;
    Ok(())
}
