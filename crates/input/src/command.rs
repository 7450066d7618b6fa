use std::fmt;
use std::str::FromStr;

/// Compass direction for a single step of the move buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Unit offset as `(d_lat, d_lng)`.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Self::North => (1.0, 0.0),
            Self::South => (-1.0, 0.0),
            Self::East => (0.0, 1.0),
            Self::West => (0.0, -1.0),
        }
    }
}

/// A high-level player command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Move one configured step.
    Step(Direction),
    /// Move by an explicit offset.
    MoveBy { d_lat: f64, d_lng: f64 },
    /// Position report from an external location feed.
    MoveTo { lat: f64, lng: f64 },
    /// Take a coin from the cache at `(i, j)`.
    PickUp { i: i32, j: i32, serial: u32 },
    /// Put an inventory coin into the cache at `(i, j)`.
    Drop { i: i32, j: i32, serial: u32 },
    /// Ask where cell `(i, j)` is, to center the map on it.
    CenterOn { i: i32, j: i32 },
    /// Start over from the origin with an empty world.
    Reset,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot parse command {input:?}: {reason}")]
pub struct ParseCommandError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parses `n|s|e|w` (or the full names), `move:DLAT,DLNG`, `goto:LAT,LNG`,
    /// `pickup:I,J,SERIAL`, `drop:I,J,SERIAL`, `center:I,J` and `reset`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ParseCommandError {
            input: input.to_owned(),
            reason,
        };
        let (verb, args) = match input.trim().split_once(':') {
            Some((verb, args)) => (verb, Some(args)),
            None => (input.trim(), None),
        };
        let verb = verb.to_ascii_lowercase();
        let fields: Vec<&str> = args
            .map(|a| a.split(',').map(str::trim).collect())
            .unwrap_or_default();

        fn num<T: FromStr>(s: &str) -> Option<T> {
            s.parse().ok()
        }
        // f64 parsing accepts "NaN" and "inf"; coordinates must be finite.
        fn coord(s: &str) -> Option<f64> {
            num::<f64>(s).filter(|v| v.is_finite())
        }

        let command = match (verb.as_str(), fields.as_slice()) {
            ("n" | "north", []) => Self::Step(Direction::North),
            ("s" | "south", []) => Self::Step(Direction::South),
            ("e" | "east", []) => Self::Step(Direction::East),
            ("w" | "west", []) => Self::Step(Direction::West),
            ("reset", []) => Self::Reset,
            ("move", [a, b]) => Self::MoveBy {
                d_lat: coord(a).ok_or_else(|| fail("bad latitude offset"))?,
                d_lng: coord(b).ok_or_else(|| fail("bad longitude offset"))?,
            },
            ("goto", [a, b]) => Self::MoveTo {
                lat: coord(a).ok_or_else(|| fail("bad latitude"))?,
                lng: coord(b).ok_or_else(|| fail("bad longitude"))?,
            },
            ("pickup" | "drop", [i, j, serial]) => {
                let i = num(i).ok_or_else(|| fail("bad cell row"))?;
                let j = num(j).ok_or_else(|| fail("bad cell column"))?;
                let serial = num(serial).ok_or_else(|| fail("bad serial"))?;
                if verb == "pickup" {
                    Self::PickUp { i, j, serial }
                } else {
                    Self::Drop { i, j, serial }
                }
            }
            ("center", [i, j]) => Self::CenterOn {
                i: num(i).ok_or_else(|| fail("bad cell row"))?,
                j: num(j).ok_or_else(|| fail("bad cell column"))?,
            },
            ("n" | "north" | "s" | "south" | "e" | "east" | "w" | "west" | "reset", _) => {
                return Err(fail("takes no arguments"));
            }
            ("move" | "goto" | "pickup" | "drop" | "center", _) => {
                return Err(fail("wrong number of arguments"));
            }
            _ => return Err(fail("unknown command")),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(Direction::North) => write!(f, "n"),
            Self::Step(Direction::South) => write!(f, "s"),
            Self::Step(Direction::East) => write!(f, "e"),
            Self::Step(Direction::West) => write!(f, "w"),
            Self::MoveBy { d_lat, d_lng } => write!(f, "move:{d_lat},{d_lng}"),
            Self::MoveTo { lat, lng } => write!(f, "goto:{lat},{lng}"),
            Self::PickUp { i, j, serial } => write!(f, "pickup:{i},{j},{serial}"),
            Self::Drop { i, j, serial } => write!(f, "drop:{i},{j},{serial}"),
            Self::CenterOn { i, j } => write!(f, "center:{i},{j}"),
            Self::Reset => write!(f, "reset"),
        }
    }
}
