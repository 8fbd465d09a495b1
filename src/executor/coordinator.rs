// Screen-space geometry for gestures.
use crate::errors::{DroidClawError, DroidClawResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Missing direction means down; anything unrecognised is `InvalidDirection`.
    pub fn parse(raw: Option<&str>) -> DroidClawResult<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::Down),
            Some(s) => match s.to_ascii_lowercase().as_str() {
                "up" => Ok(Self::Up),
                "down" => Ok(Self::Down),
                "left" => Ok(Self::Left),
                "right" => Ok(Self::Right),
                _ => Err(DroidClawError::InvalidDirection(s.to_string())),
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swipe {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

/// Swipe centred on the screen midpoint, one third of the screen along the scroll axis.
///
/// Scrolling down moves content up, so the finger travels from below the
/// centre to above it.
pub fn scroll_swipe(direction: ScrollDirection, (width, height): (i32, i32)) -> Swipe {
    let (cx, cy) = (width / 2, height / 2);
    let dy = height / 3;
    let dx = width / 3;
    let (from, to) = match direction {
        ScrollDirection::Down => ((cx, cy + dy), (cx, cy - dy)),
        ScrollDirection::Up => ((cx, cy - dy), (cx, cy + dy)),
        ScrollDirection::Left => ((cx + dx, cy), (cx - dx, cy)),
        ScrollDirection::Right => ((cx - dx, cy), (cx + dx, cy)),
    };
    Swipe { from, to }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_direction_is_down() {
        assert_eq!(ScrollDirection::parse(None).unwrap(), ScrollDirection::Down);
        assert_eq!(ScrollDirection::parse(Some("  ")).unwrap(), ScrollDirection::Down);
        assert_eq!(ScrollDirection::parse(Some("LEFT")).unwrap(), ScrollDirection::Left);
    }

    #[test]
    fn rejects_unknown_direction() {
        let err = ScrollDirection::parse(Some("diagonal")).unwrap_err();
        assert!(matches!(err, DroidClawError::InvalidDirection(d) if d == "diagonal"));
    }

    #[test]
    fn down_swipes_upwards_by_a_third() {
        let s = scroll_swipe(ScrollDirection::Down, (1080, 2400));
        assert_eq!(s, Swipe { from: (540, 2000), to: (540, 400) });
    }

    #[test]
    fn horizontal_swipes_use_width() {
        assert_eq!(
            scroll_swipe(ScrollDirection::Right, (1080, 2400)),
            Swipe { from: (180, 1200), to: (900, 1200) }
        );
        assert_eq!(
            scroll_swipe(ScrollDirection::Up, (1080, 2400)),
            Swipe { from: (540, 400), to: (540, 2000) }
        );
    }
}
