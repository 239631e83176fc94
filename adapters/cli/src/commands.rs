use std::io::Write;

use anyhow::{Context, Result};
use geocoin_core::{CellCoord, Direction, Position, WELCOME_BANNER};
use geocoin_storage::StateStore;
use geocoin_system_session::{RestoreReport, Session, SessionError};
use geocoin_world::{query, snapshot};

use crate::{render, transfer};

const HELP: &str = "\
commands:
  n | s | e | w        move one cell north, south, east or west
  goto <lat> <lng>     jump to a position
  poke [<i> <j>]       take a coin from a pit (defaults to the current cell)
  stash [<i> <j>]      return the last collected coin to a pit
  look                 redraw the visible window
  inventory            list the coins you hold
  export               print the state as a transfer string
  import <payload>     replace the state with a transfer string
  reset                discard all progress and start over
  help                 show this message
  quit                 leave the game";

/// Player request parsed from one line of input.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Action {
    /// Move one cell in a direction.
    Move(Direction),
    /// Jump to a position.
    Goto(Position),
    /// Take a coin from the pit at the cell, or the player's cell.
    Poke(Option<CellCoord>),
    /// Return the newest coin to the pit at the cell, or the player's cell.
    Stash(Option<CellCoord>),
    /// Redraw the visible window.
    Look,
    /// List held coins.
    Inventory,
    /// Print a transfer string.
    Export,
    /// Replace the state with a transfer string.
    Import(String),
    /// Discard all progress.
    Reset,
    /// Print the command summary.
    Help,
    /// Leave the interactive loop.
    Quit,
}

/// Whether the interactive loop keeps reading input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Read the next line.
    Continue,
    /// Stop reading.
    Quit,
}

/// Parses one line of player input.
pub(crate) fn parse(line: &str) -> Result<Action, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Action::Look);
    };
    let arguments: Vec<&str> = words.collect();

    let action = match verb.to_ascii_lowercase().as_str() {
        "n" | "north" => Action::Move(Direction::North),
        "s" | "south" => Action::Move(Direction::South),
        "e" | "east" => Action::Move(Direction::East),
        "w" | "west" => Action::Move(Direction::West),
        "goto" => {
            let [lat, lng] = arguments.as_slice() else {
                return Err("usage: goto <lat> <lng>".to_owned());
            };
            let position = Position::new(parse_number(lat)?, parse_number(lng)?);
            if !position.is_finite() {
                return Err("coordinates must be finite".to_owned());
            }
            return Ok(Action::Goto(position));
        }
        "poke" | "p" => Action::Poke(parse_cell(&arguments)?),
        "stash" => Action::Stash(parse_cell(&arguments)?),
        "look" | "l" => Action::Look,
        "inventory" | "inv" => Action::Inventory,
        "export" => Action::Export,
        "import" => match arguments.as_slice() {
            [payload] => return Ok(Action::Import((*payload).to_owned())),
            _ => return Err("usage: import <payload>".to_owned()),
        },
        "reset" => Action::Reset,
        "help" | "?" => Action::Help,
        "quit" | "exit" | "q" => Action::Quit,
        other => return Err(format!("unknown command `{other}`; type `help` for a list")),
    };

    if !arguments.is_empty() && !matches!(action, Action::Poke(_) | Action::Stash(_)) {
        return Err(format!("`{verb}` takes no arguments"));
    }
    Ok(action)
}

fn parse_number(word: &str) -> Result<f64, String> {
    word.parse()
        .map_err(|_| format!("`{word}` is not a number"))
}

fn parse_cell(arguments: &[&str]) -> Result<Option<CellCoord>, String> {
    match arguments {
        [] => Ok(None),
        [i, j] => {
            let i = i.parse().map_err(|_| format!("`{i}` is not a cell index"))?;
            let j = j.parse().map_err(|_| format!("`{j}` is not a cell index"))?;
            Ok(Some(CellCoord::new(i, j)))
        }
        _ => Err("expected a cell as `<i> <j>`".to_owned()),
    }
}

/// Prints the banner and window, then executes actions read from `input`
/// until it is exhausted or the player quits.
pub(crate) fn play<S: StateStore>(
    session: &mut Session<S>,
    input: impl std::io::BufRead,
    output: &mut impl Write,
) -> Result<()> {
    writeln!(output, "{WELCOME_BANNER} Type `help` for commands.")?;
    let _ = execute(session, Action::Look, output)?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        match parse(&line) {
            Ok(action) => {
                if execute(session, action, output)? == Flow::Quit {
                    return Ok(());
                }
            }
            Err(message) => writeln!(output, "{message}")?,
        }
        write!(output, "> ")?;
        output.flush()?;
    }
    writeln!(output)?;
    Ok(())
}

/// Executes a single action, writing its outcome to `output`.
///
/// Rejected moves are reported to the player; only store failures abort.
pub(crate) fn execute<S: StateStore>(
    session: &mut Session<S>,
    action: Action,
    output: &mut impl Write,
) -> Result<Flow> {
    match action {
        Action::Move(direction) => {
            let created = persisted(session.step(direction))?;
            describe_move(session, created.len(), output)?;
        }
        Action::Goto(position) => {
            let created = persisted(session.relocate(position))?;
            describe_move(session, created.len(), output)?;
        }
        Action::Poke(cell) => {
            let cell = cell.unwrap_or_else(|| query::player_cell(session.world()));
            match session.poke(cell) {
                Ok(coin) => writeln!(
                    output,
                    "collected coin {coin} from {cell}; score {}",
                    query::score(session.world())
                )?,
                Err(SessionError::Store(error)) => return Err(store_failure(error)),
                Err(rejected) => writeln!(output, "{rejected}")?,
            }
        }
        Action::Stash(cell) => {
            let cell = cell.unwrap_or_else(|| query::player_cell(session.world()));
            match session.stash(cell) {
                Ok(coin) => writeln!(
                    output,
                    "stashed coin {coin} at {cell}; score {}",
                    query::score(session.world())
                )?,
                Err(SessionError::Store(error)) => return Err(store_failure(error)),
                Err(rejected) => writeln!(output, "{rejected}")?,
            }
        }
        Action::Look => {
            write!(output, "{}", render::window(session.world()))?;
            writeln!(output, "{}", render::status(session.world()))?;
        }
        Action::Inventory => {
            let inventory = query::inventory(session.world());
            if inventory.is_empty() {
                writeln!(output, "you hold no coins")?;
            } else {
                let coins: Vec<String> =
                    inventory.coins().iter().map(ToString::to_string).collect();
                writeln!(output, "holding {}: {}", coins.len(), coins.join(" "))?;
            }
        }
        Action::Export => {
            writeln!(
                output,
                "{}",
                transfer::encode(&snapshot::capture(session.world()))
            )?;
        }
        Action::Import(payload) => match transfer::decode(&payload) {
            Ok(loaded) => {
                let report = persisted(session.adopt(loaded))?;
                describe_restore(&report, output)?;
                let _ = execute(session, Action::Look, output)?;
            }
            Err(error) => writeln!(output, "import failed: {error}")?,
        },
        Action::Reset => {
            persisted(session.reset())?;
            writeln!(output, "all progress discarded")?;
            let _ = execute(session, Action::Look, output)?;
        }
        Action::Help => writeln!(output, "{HELP}")?,
        Action::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Reports skipped entries of a restored state.
pub(crate) fn describe_restore(report: &RestoreReport, output: &mut impl Write) -> Result<()> {
    if report.corrupt.is_empty() {
        return Ok(());
    }
    writeln!(
        output,
        "{} damaged entries were skipped while restoring:",
        report.corrupt.len()
    )?;
    for record in &report.corrupt {
        writeln!(output, "  {record}")?;
    }
    Ok(())
}

fn describe_move<S: StateStore>(
    session: &Session<S>,
    created: usize,
    output: &mut impl Write,
) -> Result<()> {
    write!(output, "{}", render::window(session.world()))?;
    writeln!(output, "{}", render::status(session.world()))?;
    if created > 0 {
        writeln!(output, "{created} new pits discovered")?;
    }
    Ok(())
}

fn persisted<T>(result: Result<T, SessionError>) -> Result<T> {
    result.map_err(|error| match error {
        SessionError::Store(error) => store_failure(error),
        other => anyhow::Error::new(other),
    })
}

fn store_failure(error: geocoin_storage::StoreError) -> anyhow::Error {
    anyhow::Error::new(error).context("failed to persist game state")
}

#[cfg(test)]
mod tests {
    use geocoin_storage::MemoryStore;
    use geocoin_system_session::Config;

    use super::*;

    fn session() -> Session<MemoryStore> {
        let mut session = Session::new(
            Config {
                seed: 0x5eed,
                ..Config::default()
            },
            MemoryStore::default(),
        );
        let _ = session.start().expect("session starts");
        session
    }

    fn run(session: &mut Session<MemoryStore>, line: &str) -> String {
        let mut output = Vec::new();
        let action = parse(line).expect("line parses");
        let _ = execute(session, action, &mut output).expect("action executes");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[test]
    fn parses_moves_and_cells() {
        assert_eq!(parse("n"), Ok(Action::Move(Direction::North)));
        assert_eq!(parse("  West "), Ok(Action::Move(Direction::West)));
        assert_eq!(parse("poke"), Ok(Action::Poke(None)));
        assert_eq!(
            parse("stash -3 12"),
            Ok(Action::Stash(Some(CellCoord::new(-3, 12))))
        );
        assert_eq!(
            parse("goto 36.98 -122.06"),
            Ok(Action::Goto(Position::new(36.98, -122.06)))
        );
        assert_eq!(parse(""), Ok(Action::Look));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("fly").is_err());
        assert!(parse("goto 1").is_err());
        assert!(parse("goto NaN 0").is_err());
        assert!(parse("poke 1").is_err());
        assert!(parse("look around").is_err());
        assert!(parse("import").is_err());
    }

    #[test]
    fn poke_on_empty_cell_reports_rejection() {
        let mut session = session();
        let empty = session
            .visible_window()
            .iter()
            .find(|(_, pit)| pit.is_none())
            .map(|(identity, _)| identity.coord())
            .expect("window contains an empty cell");

        let output = run(&mut session, &format!("poke {} {}", empty.i(), empty.j()));
        assert_eq!(output.trim(), format!("there is no pit at cell {empty}"));
        assert_eq!(query::score(session.world()), 0);
    }

    #[test]
    fn export_then_import_restores_progress() {
        let mut source = session();
        let cell = query::pits(source.world())
            .find(|pit| !pit.is_empty())
            .map(|pit| pit.cell())
            .expect("window contains a pit with coins");
        let _ = run(&mut source, &format!("poke {} {}", cell.i(), cell.j()));
        let exported = run(&mut source, "export");

        let mut target = session();
        let _ = run(&mut target, &format!("import {}", exported.trim()));
        assert_eq!(query::score(target.world()), 1);
        assert_eq!(
            query::inventory(target.world()).coins(),
            query::inventory(source.world()).coins()
        );
    }

    #[test]
    fn reset_discards_progress() {
        let mut session = session();
        let cell = query::pits(session.world())
            .find(|pit| !pit.is_empty())
            .map(|pit| pit.cell())
            .expect("window contains a pit with coins");
        let _ = run(&mut session, &format!("poke {} {}", cell.i(), cell.j()));
        let output = run(&mut session, "reset");
        assert!(output.starts_with("all progress discarded"));
        assert_eq!(query::score(session.world()), 0);
        assert!(query::inventory(session.world()).is_empty());
    }

    #[test]
    fn play_loop_stops_at_quit() {
        let mut session = session();
        let mut output = Vec::new();
        play(&mut session, "e\nbogus\nquit\nn\n".as_bytes(), &mut output).expect("loop runs");
        let text = String::from_utf8(output).expect("utf-8 output");
        assert!(text.starts_with(WELCOME_BANNER));
        assert!(text.contains("unknown command `bogus`"));
        assert_eq!(query::player_cell(session.world()), CellCoord::new(0, 1));
    }
}
