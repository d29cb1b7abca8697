//! User-facing status output for the `pm` CLI.
//!
//! - Verbosity control (quiet, normal, verbose)
//! - Verbose detail lines on stderr, dimmed
//! - Colored change markers for diff listings

use colored::{ColoredString, Colorize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Verbosity level for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Suppress informational messages, show only warnings and errors.
    Quiet = 0,
    /// Default verbosity level, show all standard messages.
    Normal = 1,
    /// Show verbose messages in addition to standard output.
    Verbose = 2,
}

impl Verbosity {
    /// Level selected by the `-q` / `-v` flags; `quiet` wins.
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

/// Global verbosity setting (default: Normal).
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Sets the global verbosity level for all output functions.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Gets the current global verbosity level.
pub fn get_verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

/// Prints a verbose message (only in verbose mode).
pub fn verbose(message: &str) {
    if get_verbosity() != Verbosity::Verbose {
        return;
    }
    eprintln!("{}", message.dimmed());
}

/// Kind of change shown next to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File appeared
    Created,
    /// File content timestamp moved
    Updated,
    /// File disappeared
    Removed,
}

impl ChangeKind {
    /// One-letter marker.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Created => 'A',
            Self::Updated => 'M',
            Self::Removed => 'D',
        }
    }

    /// Colored marker.
    #[must_use]
    pub fn colored_marker(self) -> ColoredString {
        let marker = self.marker().to_string();
        match self {
            Self::Created => marker.green(),
            Self::Updated => marker.yellow(),
            Self::Removed => marker.red(),
        }
    }
}

/// Formats a change line such as `M  conf/app.ini`.
#[must_use]
pub fn change_line(kind: ChangeKind, path: &str) -> String {
    format!("{}  {path}", kind.colored_marker())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_round_trip() {
        let levels = [Verbosity::Quiet, Verbosity::Normal, Verbosity::Verbose];
        for level in &levels {
            set_verbosity(*level);
            assert_eq!(get_verbosity(), *level);
        }
        set_verbosity(Verbosity::Normal);
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn test_change_markers() {
        colored::control::set_override(false);
        assert_eq!(change_line(ChangeKind::Created, "a.txt"), "A  a.txt");
        assert_eq!(ChangeKind::Updated.marker(), 'M');
        assert_eq!(ChangeKind::Removed.marker(), 'D');
    }
}
