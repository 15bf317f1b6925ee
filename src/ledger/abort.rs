//! Abort code classification.
//!
//! On-chain logic aborts with a numeric code. The RPC layer reports it only
//! inside the effects error text, so the code is extracted once here at the
//! client boundary and carried as a number from then on.

use std::fmt;

use regex::Regex;

/// Known abort codes of the controlled module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCode {
    /// 0: the robot is not active
    RobotInactive,
    /// 1: only the owner may confirm execution
    NotOwner,
    /// 2: another user holds the control session
    ControlledByOther,
    /// 3: sender may not end the session
    CannotEndSession,
    /// 4: no controller set
    NoActiveSession,
    /// 5: sender is not the controller
    NotController,
    /// 6: the control session ran out
    SessionExpired,
    Unknown(u64),
}

impl AbortCode {
    pub fn code(&self) -> u64 {
        match self {
            Self::RobotInactive => 0,
            Self::NotOwner => 1,
            Self::ControlledByOther => 2,
            Self::CannotEndSession => 3,
            Self::NoActiveSession => 4,
            Self::NotController => 5,
            Self::SessionExpired => 6,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<u64> for AbortCode {
    fn from(code: u64) -> Self {
        match code {
            0 => Self::RobotInactive,
            1 => Self::NotOwner,
            2 => Self::ControlledByOther,
            3 => Self::CannotEndSession,
            4 => Self::NoActiveSession,
            5 => Self::NotController,
            6 => Self::SessionExpired,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for AbortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RobotInactive => write!(f, "robot is not active"),
            Self::NotOwner => write!(f, "only the robot owner can confirm execution"),
            Self::ControlledByOther => write!(f, "robot is being controlled by another user"),
            Self::CannotEndSession => write!(f, "caller may not end this control session"),
            Self::NoActiveSession => write!(f, "no active session (no controller set)"),
            Self::NotController => write!(f, "caller is not the current controller"),
            Self::SessionExpired => write!(f, "control session has expired"),
            Self::Unknown(code) => write!(f, "unknown abort code {}", code),
        }
    }
}

/// Extract the abort code from a `MoveAbort(<location>, <code>)` status.
pub fn parse_move_abort(message: &str) -> Option<u64> {
    let re = Regex::new(r"MoveAbort\(.+?,\s*(\d+)\)").ok()?;
    re.captures(message)?.get(1)?.as_str().parse().ok()
}
