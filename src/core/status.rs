//! Status report parsing
//!
//! A `?` query is answered with a report such as
//! `<Idle|MPos:1.000,2.000,3.000|FS:0,0|Pn:PX>`. Only the state tag, the
//! machine position and the pin flags are of interest here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine position in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X axis
    pub x: f64,
    /// Y axis
    pub y: f64,
    /// Z axis
    pub z: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2},{:.2},{:.2}", self.x, self.y, self.z)
    }
}

/// Input pins reported in the `Pn:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pin {
    /// Probe touching the work surface
    Probe,
    /// X limit switch
    LimitX,
    /// Y limit switch
    LimitY,
    /// Z limit switch
    LimitZ,
    /// Safety door
    Door,
    /// Feed hold button
    Hold,
    /// Soft reset button
    SoftReset,
    /// Cycle start button
    CycleStart,
}

impl Pin {
    /// All pins, in report order
    pub const ALL: [Pin; 8] = [
        Pin::Probe,
        Pin::LimitX,
        Pin::LimitY,
        Pin::LimitZ,
        Pin::Door,
        Pin::Hold,
        Pin::SoftReset,
        Pin::CycleStart,
    ];

    /// Letter used for this pin inside `Pn:`
    pub fn letter(self) -> char {
        match self {
            Self::Probe => 'P',
            Self::LimitX => 'X',
            Self::LimitY => 'Y',
            Self::LimitZ => 'Z',
            Self::Door => 'D',
            Self::Hold => 'H',
            Self::SoftReset => 'R',
            Self::CycleStart => 'S',
        }
    }

    /// Reverse of [`Pin::letter`]
    pub fn from_letter(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|pin| pin.letter() == c)
    }

    /// Four character marker matched in [`PinMatchMode::Substring`] mode,
    /// e.g. `Pn:P`.
    pub fn marker(self) -> String {
        format!("Pn:{}", self.letter())
    }
}

/// How pin flags are recognised in a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMatchMode {
    /// A pin counts as asserted when `Pn:<letter>` occurs anywhere in the
    /// raw text. `Pn:PX` therefore reports the probe but not the X limit.
    #[default]
    Substring,
    /// Parse the letters of the `Pn:` segment only.
    Structured,
}

/// Parsed reply to a `?` query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusFrame {
    /// Raw text as received
    pub raw: String,
    /// State tag, e.g. `Idle`, `Run`, `Alarm`. Empty for partial replies.
    pub state: String,
    /// Machine position; zero when the report carries no `MPos:` field
    pub position: Position,
    /// Asserted pins, sorted
    pub pins: Vec<Pin>,
}

impl StatusFrame {
    /// Parse `text` using `mode` for pin detection. Never fails: missing or
    /// garbled fields fall back to empty/zero values.
    pub fn parse(text: &str, mode: PinMatchMode) -> Self {
        let pins = match mode {
            PinMatchMode::Substring => Pin::ALL
                .into_iter()
                .filter(|pin| text.contains(&pin.marker()))
                .collect(),
            PinMatchMode::Structured => parse_pin_field(text),
        };

        Self {
            raw: text.to_string(),
            state: parse_state(text),
            position: parse_machine_position(text).unwrap_or_default(),
            pins,
        }
    }

    /// True if `pin` is asserted
    pub fn has_pin(&self, pin: Pin) -> bool {
        self.pins.contains(&pin)
    }

    /// True if the controller reports `Idle`
    pub fn is_idle(&self) -> bool {
        self.state.starts_with("Idle")
    }

    /// Raw text without line endings, for reports
    pub fn text(&self) -> String {
        self.raw.replace(['\r', '\n'], "")
    }
}

/// `<Idle|...` → `Idle`. `Hold:0` keeps its sub-state.
fn parse_state(text: &str) -> String {
    let Some(body) = text.trim_start().strip_prefix('<') else {
        return String::new();
    };
    body.split(['|', '>', ',', '\r', '\n'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Extract `MPos:x,y,z`. `None` when absent or malformed.
fn parse_machine_position(text: &str) -> Option<Position> {
    let segment = text
        .split('|')
        .find_map(|segment| segment.trim().strip_prefix("MPos:"))?;

    let segment = segment.trim_end_matches(|c: char| c == '>' || c.is_whitespace());
    let coords: Vec<f64> = match segment
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
    {
        Ok(coords) => coords,
        Err(e) => {
            tracing::warn!("Unparsable MPos field {:?}: {}", segment, e);
            return None;
        }
    };

    match coords.as_slice() {
        [x, y, z] => Some(Position::new(*x, *y, *z)),
        _ => {
            tracing::warn!("MPos field {:?} does not hold three axes", segment);
            None
        }
    }
}

fn parse_pin_field(text: &str) -> Vec<Pin> {
    let Some(field) = text
        .split(['|', '<', '>', '\r', '\n'])
        .find_map(|segment| segment.trim().strip_prefix("Pn:"))
    else {
        return Vec::new();
    };

    let mut pins: Vec<Pin> = field.chars().filter_map(Pin::from_letter).collect();
    pins.sort();
    pins.dedup();
    pins
}
