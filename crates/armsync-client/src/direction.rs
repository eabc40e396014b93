//! 相对移动方向
//!
//! 坐标约定：右 = +x，上 = +y，前 = +z。

use armsync_protocol::Position;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
    Forward,
    Backward,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
        Direction::Forward,
        Direction::Backward,
    ];

    /// 单位位移
    pub fn unit(self) -> Position {
        match self {
            Direction::Right => Position::new(1.0, 0.0, 0.0),
            Direction::Left => Position::new(-1.0, 0.0, 0.0),
            Direction::Up => Position::new(0.0, 1.0, 0.0),
            Direction::Down => Position::new(0.0, -1.0, 0.0),
            Direction::Forward => Position::new(0.0, 0.0, 1.0),
            Direction::Backward => Position::new(0.0, 0.0, -1.0),
        }
    }

    /// 反方向
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Right => Direction::Left,
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Right => "right",
            Direction::Left => "left",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        };
        f.write_str(name)
    }
}

/// 无法识别的方向名
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown direction: {0:?}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "right" | "r" => Ok(Direction::Right),
            "left" | "l" => Ok(Direction::Left),
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "forward" | "forwards" | "f" => Ok(Direction::Forward),
            "backward" | "backwards" | "back" | "b" => Ok(Direction::Backward),
            _ => Err(UnknownDirection(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_are_axis_aligned() {
        for dir in Direction::ALL {
            let u = dir.unit();
            assert_eq!(u.distance_to(&Position::ORIGIN), 1.0, "{}", dir);
            assert_eq!(u + dir.opposite().unit(), Position::ORIGIN);
        }
        assert_eq!(Direction::Up.unit(), Position::new(0.0, 1.0, 0.0));
        assert_eq!(Direction::Backward.unit(), Position::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Right".parse::<Direction>().unwrap(), Direction::Right);
        assert_eq!(" back ".parse::<Direction>().unwrap(), Direction::Backward);
        assert_eq!("forwards".parse::<Direction>().unwrap(), Direction::Forward);
        assert_eq!(
            "sideways".parse::<Direction>().unwrap_err(),
            UnknownDirection("sideways".into())
        );
        for dir in Direction::ALL {
            assert_eq!(dir.to_string().parse::<Direction>().unwrap(), dir);
        }
    }
}
