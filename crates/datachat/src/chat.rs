//! Terminal front end for the chat console.

use datachat_core::{ChatConsole, Connection, EventOutcome, Result, TurnRole};

use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// What the REPL should do with one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Ask(&'a str),
    Clear,
    Use(Option<i64>),
    Connections,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return if line.is_empty() { Input::Empty } else { Input::Ask(line) };
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "clear" => Input::Clear,
        "use" => Input::Use(arg.parse().ok()),
        "connections" => Input::Connections,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

const HELP: &str = "\
Type a question to ask it against the selected connection.
  /connections   list enabled connections
  /use <id>      switch connection
  /clear         stop the answer and clear the conversation
  /quit          leave
Ctrl-C while an answer streams clears the conversation; at the prompt it quits.";

enum Step {
    Event(Option<EventOutcome>),
    Interrupted,
}

/// Stream the pending answer to stdout until it ends or Ctrl-C.
pub async fn stream_answer(console: &mut ChatConsole) {
    let mut printed = 0;
    while console.session().is_busy() {
        let step = tokio::select! {
            outcome = console.pump() => Step::Event(outcome),
            _ = tokio::signal::ctrl_c() => Step::Interrupted,
        };

        match step {
            Step::Interrupted => {
                console.clear();
                println!();
                eprintln!("Interrupted; conversation cleared.");
                return;
            }
            Step::Event(None) => break,
            Step::Event(Some(_)) => print_delta(console, &mut printed),
        }
    }
    println!();
    print_notices(console);
}

fn print_delta(console: &ChatConsole, printed: &mut usize) {
    let Some(turn) = console.transcript().last() else {
        return;
    };
    if turn.role != TurnRole::Assistant {
        return;
    }
    if let Some(delta) = turn.text.get(*printed..).filter(|d| !d.is_empty()) {
        print!("{delta}");
        let _ = std::io::stdout().flush();
        *printed = turn.text.len();
    }
}

/// Print and clear queued notices on stderr.
pub fn print_notices(console: &mut ChatConsole) {
    for notice in console.take_notices() {
        eprintln!("{notice}");
    }
}

pub fn print_connections(connections: &[Connection]) {
    if connections.is_empty() {
        println!("No connections.");
        return;
    }
    for connection in connections {
        let state = if connection.enabled { "enabled" } else { "disabled" };
        println!(
            "{:>6}  {:<24}  {:<10}  {:<8}  {}",
            connection.id,
            connection.name,
            connection.db_type,
            state,
            connection.display_url()
        );
    }
}

/// Ask one question and stream the answer.
pub async fn ask(console: &mut ChatConsole, query: &str) -> Result<()> {
    if console.send(query)?.is_some() {
        stream_answer(console).await;
    }
    print_notices(console);
    Ok(())
}

/// Next input line, or `None` on end of input or when `interrupt` fires first.
async fn next_input<R>(lines: &mut Lines<R>, interrupt: impl Future) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => {
            eprintln!();
            Ok(None)
        }
    }
}

/// Line-based chat loop on stdin.
pub async fn run_repl(console: &mut ChatConsole) -> Result<()> {
    match console.selected_connection() {
        Some(connection) => eprintln!("Using connection {} ({})", connection.id, connection.name),
        None => eprintln!("No connection selected; try /connections and /use <id>"),
    }
    eprintln!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c()).await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Ask(query) => {
                // Validation problems are already queued as notices.
                let _ = ask(console, query).await;
            }
            Input::Clear => {
                console.clear();
                eprintln!("Conversation cleared.");
            }
            Input::Use(Some(id)) => {
                if console.select_connection(id).is_ok() {
                    eprintln!("Using connection {id}");
                }
                print_notices(console);
            }
            Input::Use(None) => eprintln!("Usage: /use <id>"),
            Input::Connections => {
                let connections = console.load_connections().await;
                print_connections(&connections);
                print_notices(console);
            }
            Input::Help => eprintln!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(name) => eprintln!("Unknown command /{name}; try /help"),
        }
    }

    console.teardown();
    Ok(())
}
