//! Canonical cell identities and lattice geometry.

use std::{collections::HashMap, rc::Rc};

use geocoin_core::{CellCoord, Position};

/// Canonical, immutable identity of a lattice cell.
///
/// At most one instance exists per coordinate for the lifetime of the
/// [`CellCache`] that created it, so [`Rc::ptr_eq`] is a valid identity test.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CellIdentity {
    coord: CellCoord,
}

impl CellIdentity {
    /// Coordinate the identity stands for.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Latitude index of the cell.
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.coord.i()
    }

    /// Longitude index of the cell.
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.coord.j()
    }
}

/// Continuous rectangle covered by a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBounds {
    min: Position,
    max: Position,
}

impl CellBounds {
    /// Corner with the smallest components.
    #[must_use]
    pub const fn min(&self) -> Position {
        self.min
    }

    /// Corner with the largest components.
    #[must_use]
    pub const fn max(&self) -> Position {
        self.max
    }

    /// Reports whether the position lies inside the half-open rectangle.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.lat() >= self.min.lat()
            && position.lat() < self.max.lat()
            && position.lng() >= self.min.lng()
            && position.lng() < self.max.lng()
    }
}

/// Flyweight cache mapping coordinates to their canonical [`CellIdentity`].
///
/// The cache never evicts; it grows with the number of distinct cells seen
/// during the session.
#[derive(Debug)]
pub struct CellCache {
    tile_width: f64,
    known: HashMap<CellCoord, Rc<CellIdentity>>,
}

impl CellCache {
    /// Creates an empty cache for cells of the provided width.
    #[must_use]
    pub fn new(tile_width: f64) -> Self {
        Self {
            tile_width,
            known: HashMap::new(),
        }
    }

    /// Side length of a single cell in position units.
    #[must_use]
    pub const fn tile_width(&self) -> f64 {
        self.tile_width
    }

    pub(crate) fn set_tile_width(&mut self, tile_width: f64) {
        self.tile_width = tile_width;
    }

    /// Returns the canonical identity of `(i, j)`, creating it on first use.
    pub fn canonicalize(&mut self, i: i32, j: i32) -> Rc<CellIdentity> {
        let coord = CellCoord::new(i, j);
        Rc::clone(
            self.known
                .entry(coord)
                .or_insert_with(|| Rc::new(CellIdentity { coord })),
        )
    }

    /// Converts a continuous position into the coordinate of its cell.
    #[must_use]
    pub fn coord_for_point(&self, position: Position) -> CellCoord {
        CellCoord::new(
            cell_index(position.lat(), self.tile_width),
            cell_index(position.lng(), self.tile_width),
        )
    }

    /// Reports whether the window of `radius` cells around `position` has
    /// indices representable as `i32` on both axes.
    #[must_use]
    pub fn covers(&self, position: Position, radius: u32) -> bool {
        let limit = f64::from(i32::MAX) - f64::from(radius);
        [position.lat(), position.lng()].into_iter().all(|value| {
            let index = (value / self.tile_width).floor();
            index.is_finite() && index.abs() <= limit
        })
    }

    /// Returns the canonical identity of the cell containing `position`.
    pub fn cell_for_point(&mut self, position: Position) -> Rc<CellIdentity> {
        let coord = self.coord_for_point(position);
        self.canonicalize(coord.i(), coord.j())
    }

    /// Continuous rectangle covered by `cell`.
    #[must_use]
    pub fn bounds(&self, cell: CellCoord) -> CellBounds {
        let min_lat = f64::from(cell.i()) * self.tile_width;
        let min_lng = f64::from(cell.j()) * self.tile_width;
        CellBounds {
            min: Position::new(min_lat, min_lng),
            max: Position::new(min_lat + self.tile_width, min_lng + self.tile_width),
        }
    }

    /// Lists the `(2·radius+1)²` cells of the square window centred on the
    /// cell containing `origin`, scanning `i` then `j` in increasing order.
    pub fn cells_near(&mut self, origin: Position, radius: u32) -> Vec<Rc<CellIdentity>> {
        let center = self.coord_for_point(origin);
        let radius = i32::try_from(radius).unwrap_or(i32::MAX);
        let side = usize::try_from(radius).unwrap_or(0).saturating_mul(2) + 1;
        let mut cells = Vec::with_capacity(side.saturating_mul(side));
        for di in -radius..=radius {
            for dj in -radius..=radius {
                let coord = center.offset(di, dj);
                cells.push(self.canonicalize(coord.i(), coord.j()));
            }
        }
        cells
    }

    /// Number of distinct cells seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Reports whether no cell has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Floor-divides a continuous component by the tile width.
#[must_use]
pub fn cell_index(value: f64, tile_width: f64) -> i32 {
    (value / tile_width).floor() as i32
}
