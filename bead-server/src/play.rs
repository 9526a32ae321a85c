//! Line-oriented terminal play.
//!
//! Plain lines are turns. Lines starting with `#` are commands:
//!
//! - `#quit` - leave (the session stays saved)
//! - `#reset` - start a new game
//! - `#status` - show the trajectory and commentary
//! - `#graph` - list concepts and their connections
//! - `#copy` - print the trajectory as exportable text
//! - `#dismiss` - clear the error banner
//! - `#publish <pseudonym> | <title> | <reflection>` - publish to the gallery
//! - `#help` - show this list

use bead_core::display::{format_line, NodeKind, Segment};
use bead_core::gallery::GalleryStore;
use bead_core::persist::SlotStore;
use bead_core::session::{GameSession, TurnOutcome};
use bead_core::trajectory::TrajectoryState;
use bead_core::turn::TurnClient;
use bead_core::TrajectoryGraph;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Reset,
    Status,
    Graph,
    Copy,
    Dismiss,
    Publish {
        pseudonym: String,
        title: String,
        reflection: String,
    },
    Say(String),
}

/// Parse one input line; `None` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('#') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((rest, ""));

    let command = match name {
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        "reset" | "new" => Command::Reset,
        "status" => Command::Status,
        "graph" => Command::Graph,
        "copy" => Command::Copy,
        "dismiss" => Command::Dismiss,
        "publish" => {
            let parts: Vec<&str> = args.splitn(3, '|').map(str::trim).collect();
            match parts.as_slice() {
                [pseudonym, title, reflection] => Command::Publish {
                    pseudonym: pseudonym.to_string(),
                    title: title.to_string(),
                    reflection: reflection.to_string(),
                },
                _ => return Err("Usage: #publish <pseudonym> | <title> | <reflection>".to_string()),
            }
        }
        other => return Err(format!("Unknown command: #{other} (try #help)")),
    };
    Ok(Some(command))
}

/// A trajectory line for the terminal: concept numbers as superscript-like
/// `^n`, connectors padded.
pub fn render_line(text: &str) -> String {
    format_line(text)
        .iter()
        .map(|segment| match segment {
            Segment::Concept {
                name,
                number: Some(n),
            } => format!("[{name}]^{n}"),
            other => other.source(),
        })
        .collect()
}

pub fn render_state(state: &TrajectoryState) -> String {
    if state.is_empty() {
        return "(the trajectory is empty)".to_string();
    }

    let mut out = String::new();
    for line in &state.trajectory {
        out.push_str(&render_line(&line.text));
        out.push('\n');
    }
    if !state.commentary.is_empty() {
        out.push('\n');
        out.push_str(&state.commentary_text());
        out.push('\n');
    }
    let missing = state.missing_commentary();
    if !missing.is_empty() {
        let numbers: Vec<String> = missing.iter().map(u32::to_string).collect();
        out.push_str(&format!("(no commentary yet for {})\n", numbers.join(", ")));
    }
    out
}

pub fn render_graph(graph: &TrajectoryGraph) -> String {
    let mut out = String::new();
    for concept in &graph.concepts {
        let marker = match concept.kind {
            NodeKind::Synthesis => "★",
            NodeKind::Concept => "•",
        };
        let recent = if concept.recent { " (new)" } else { "" };
        out.push_str(&format!("{marker} {}^{}{recent}\n", concept.name, concept.number));
    }
    for edge in &graph.connections {
        out.push_str(&format!(
            "  {} {} {}  [{}]\n",
            edge.from,
            edge.symbol,
            edge.to,
            edge.class.name()
        ));
    }
    out
}

fn print_help() {
    println!("Commands:");
    println!("  #quit      - Exit (the game stays saved)");
    println!("  #reset     - Start a new game");
    println!("  #status    - Show the trajectory and commentary");
    println!("  #graph     - Show concepts and connections");
    println!("  #copy      - Print the trajectory as text");
    println!("  #dismiss   - Clear the last error");
    println!("  #publish <pseudonym> | <title> | <reflection>");
    println!("  #help      - Show this help");
}

/// Drive `session` from stdin until end of input or `#quit`.
pub async fn run<C, S, G>(session: &mut GameSession<C, S>, gallery: &G) -> anyhow::Result<()>
where
    C: TurnClient,
    S: SlotStore,
    G: GalleryStore,
{
    println!("=== The Glass Bead Game ===");
    if session.messages().is_empty() {
        println!("Name a theme or a pair of concepts to begin.");
    } else {
        println!("Resuming a game of {} messages.", session.messages().len());
        println!("{}", render_state(session.trajectory_state()));
    }
    print_help();
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("[ERROR] {e}");
                continue;
            }
        };

        match command {
            Command::Quit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => print_help(),
            Command::Reset => {
                session.reset_game().await;
                println!("[RESET] A new game begins.");
            }
            Command::Status => println!("{}", render_state(session.trajectory_state())),
            Command::Graph => {
                let graph = TrajectoryGraph::from_state(session.trajectory_state());
                if graph.is_empty() {
                    println!("(no concepts yet)");
                } else {
                    print!("{}", render_graph(&graph));
                }
            }
            Command::Copy => println!("{}", session.trajectory_state().export_text()),
            Command::Dismiss => session.clear_error(),
            Command::Publish {
                pseudonym,
                title,
                reflection,
            } => {
                let game = session.publish(pseudonym, title, reflection);
                match gallery.create(game).await {
                    Ok(published) => println!("[PUBLISHED] {} ({})", published.game.title, published.id),
                    Err(e) => println!("[ERROR] Publish failed: {e}"),
                }
            }
            Command::Say(text) => {
                println!("...");
                match session.send_turn(&text).await {
                    Ok(TurnOutcome::Completed { .. }) | Ok(TurnOutcome::Failed { .. }) => {
                        if let Some(reply) = session.messages().last() {
                            println!("\n{}\n", reply.content);
                        }
                        if let Some(error) = session.error() {
                            println!("[ERROR] {error}");
                        } else {
                            println!("{}", render_state(session.trajectory_state()));
                        }
                    }
                    Ok(TurnOutcome::Ignored) => {}
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
        }
    }

    Ok(())
}
