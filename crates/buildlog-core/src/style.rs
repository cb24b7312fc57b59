//! Severity colors for console output.
//!
//! Color is presentation only: with styling disabled the rendered text is
//! exactly the input, and with it enabled only ANSI escapes are added around
//! it.

use console::style;

use crate::config::ColorChoice;

/// How alarming a console line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational, left uncolored
    Neutral,
    Alert,
    Warning,
    Muted,
}

/// Which stream a painter styles for; `Auto` is resolved against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(choice: ColorChoice, stream: Stream) -> Self {
        let enabled = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => match stream {
                Stream::Stdout => console::colors_enabled(),
                Stream::Stderr => console::colors_enabled_stderr(),
            },
        };
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn paint(&self, severity: Severity, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let styled = style(text).force_styling(true);
        match severity {
            Severity::Neutral => text.to_string(),
            Severity::Alert => styled.red().to_string(),
            Severity::Warning => styled.yellow().to_string(),
            Severity::Muted => styled.dim().to_string(),
        }
    }
}
