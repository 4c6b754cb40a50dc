//! Color scheme for the terminal interface, chosen once at startup.

use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Debug)]
pub struct Theme {
    pub normal: Style,
    pub highlight: Style,
    pub prompt: Style,
    pub pointer: Style,
    pub marker: Style,
    pub info: Style,
    pub current: Style,
}

impl Theme {
    /// Pick a palette. `ansi256` selects the richer indexed palette when the
    /// terminal advertises it, `black` forces a black background, and
    /// `color: false` drops to attributes only.
    pub fn new(color: bool, black: bool, ansi256: bool) -> Self {
        if !color {
            return Self::monochrome();
        }
        let background = if black { Some(Color::Black) } else { None };
        let with_bg = |style: Style| match background {
            Some(bg) => style.bg(bg),
            None => style,
        };
        if ansi256 {
            Self {
                normal: with_bg(Style::new()),
                highlight: with_bg(Style::new().fg(Color::Indexed(151))),
                prompt: with_bg(Style::new().fg(Color::Indexed(110))),
                pointer: with_bg(Style::new().fg(Color::Indexed(161))),
                marker: with_bg(Style::new().fg(Color::Indexed(168))),
                info: with_bg(Style::new().fg(Color::Indexed(144))),
                current: Style::new().bg(Color::Indexed(236)).fg(Color::Indexed(229)),
            }
        } else {
            Self {
                normal: with_bg(Style::new()),
                highlight: with_bg(Style::new().fg(Color::Green)),
                prompt: with_bg(Style::new().fg(Color::Blue)),
                pointer: with_bg(Style::new().fg(Color::Red)),
                marker: with_bg(Style::new().fg(Color::Magenta)),
                info: with_bg(Style::new().fg(Color::Yellow)),
                current: Style::new().bg(Color::DarkGray).fg(Color::Yellow),
            }
        }
    }

    fn monochrome() -> Self {
        Self {
            normal: Style::new(),
            highlight: Style::new().add_modifier(Modifier::UNDERLINED),
            prompt: Style::new().add_modifier(Modifier::BOLD),
            pointer: Style::new().add_modifier(Modifier::BOLD),
            marker: Style::new().add_modifier(Modifier::BOLD),
            info: Style::new().add_modifier(Modifier::DIM),
            current: Style::new().add_modifier(Modifier::REVERSED),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(true, false, false)
    }
}

/// Whether `$TERM` advertises the 256-color palette.
pub fn term_supports_256(term: Option<&str>) -> bool {
    term.is_some_and(|value| value.contains("256"))
}
