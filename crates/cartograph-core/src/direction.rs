//! Compass and vertical directions used for gate slots.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string names no known direction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a direction")]
pub struct UnknownDirection(pub String);

/// A gate slot on a plot.
///
/// Grid offsets place `y` growing southward, so [`Direction::South`] is
/// `(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Up,
    Down,
}

impl Direction {
    /// Every direction, in slot order.
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::Up,
        Direction::Down,
    ];

    /// The slot a gate occupies on its destination plot.
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Grid offset for planar directions; `None` for up and down.
    pub fn offset(self) -> Option<(i64, i64)> {
        match self {
            Direction::North => Some((0, -1)),
            Direction::NorthEast => Some((1, -1)),
            Direction::East => Some((1, 0)),
            Direction::SouthEast => Some((1, 1)),
            Direction::South => Some((0, 1)),
            Direction::SouthWest => Some((-1, 1)),
            Direction::West => Some((-1, 0)),
            Direction::NorthWest => Some((-1, -1)),
            Direction::Up | Direction::Down => None,
        }
    }

    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::NorthEast => "northeast",
            Direction::East => "east",
            Direction::SouthEast => "southeast",
            Direction::South => "south",
            Direction::SouthWest => "southwest",
            Direction::West => "west",
            Direction::NorthWest => "northwest",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = UnknownDirection;

    /// Parses canonical names and short aliases, ignoring case, `-` and `_`.
    ///
    /// ```
    /// use cartograph_core::Direction;
    ///
    /// assert_eq!("North-East".parse(), Ok(Direction::NorthEast));
    /// assert_eq!("d".parse(), Ok(Direction::Down));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        let direction = match folded.as_str() {
            "north" | "n" => Direction::North,
            "northeast" | "ne" => Direction::NorthEast,
            "east" | "e" => Direction::East,
            "southeast" | "se" => Direction::SouthEast,
            "south" | "s" => Direction::South,
            "southwest" | "sw" => Direction::SouthWest,
            "west" | "w" => Direction::West,
            "northwest" | "nw" => Direction::NorthWest,
            "up" | "u" => Direction::Up,
            "down" | "d" => Direction::Down,
            _ => return Err(UnknownDirection(s.to_string())),
        };
        Ok(direction)
    }
}
