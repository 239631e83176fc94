use std::fmt::Write as _;

use geocoin_core::CellCoord;
use geocoin_world::{query, World};

const PLAYER_GLYPH: char = '@';
const EMPTY_GLYPH: char = '.';
const LARGE_PIT_GLYPH: char = '+';

/// Draws the visible window as text, north at the top and east to the right.
///
/// The player is drawn as `@`, pits as their coin count (`+` above nine)
/// and cells without a pit as `.`.
#[must_use]
pub(crate) fn window(world: &World) -> String {
    let center = query::player_cell(world);
    let radius = i32::try_from(query::visibility_radius(world)).unwrap_or(i32::MAX);
    let mut frame = String::new();

    for di in (-radius..=radius).rev() {
        let row: Vec<String> = (-radius..=radius)
            .map(|dj| glyph(world, center, center.offset(di, dj)).to_string())
            .collect();
        frame.push_str(&row.join(" "));
        frame.push('\n');
    }
    frame
}

/// One-line summary of the player's position and holdings.
#[must_use]
pub(crate) fn status(world: &World) -> String {
    let position = query::player_position(world);
    let mut line = String::new();
    let _ = write!(
        line,
        "cell {} ({:.6}, {:.6}) | score {} | holding {} | pits known {}",
        query::player_cell(world),
        position.lat(),
        position.lng(),
        query::score(world),
        query::inventory(world).len(),
        query::pits(world).count()
    );
    line
}

fn glyph(world: &World, player: CellCoord, cell: CellCoord) -> char {
    if cell == player {
        return PLAYER_GLYPH;
    }
    match query::pit(world, cell) {
        None => EMPTY_GLYPH,
        Some(pit) => char::from_digit(pit.value(), 10).unwrap_or(LARGE_PIT_GLYPH),
    }
}
