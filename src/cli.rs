//! Command-line interface.
//!
//! Options come from three layers: `$SIFT_DEFAULT_OPTS` (split with POSIX
//! shell quoting rules), then argv. Legacy `+x` toggle forms are rewritten
//! to their `--no-*` long equivalents before clap parses anything.

use clap::Parser;

use crate::matcher::{CaseMode, MatcherKind};
use crate::searcher::SearchConfig;
use crate::ui::theme::{Theme, term_supports_256};

pub const DEFAULT_OPTS_ENV: &str = "SIFT_DEFAULT_OPTS";

#[derive(Parser, Debug)]
#[command(
    name = "sift",
    version,
    about = "Interactive fuzzy finder for newline-delimited input"
)]
pub struct CliArgs {
    #[arg(short = 'x', long, help = "Extended-search mode with fuzzy sub-terms")]
    pub extended: bool,
    #[arg(
        short = 'e',
        long = "extended-exact",
        help = "Extended-search mode with exact sub-terms"
    )]
    pub extended_exact: bool,
    #[arg(
        short = 'i',
        long = "ignore-case",
        overrides_with = "case_sensitive",
        help = "Case-insensitive matching (default: smart-case)"
    )]
    pub ignore_case: bool,
    #[arg(
        long = "case-sensitive",
        overrides_with = "ignore_case",
        help = "Case-sensitive matching (+i)"
    )]
    pub case_sensitive: bool,
    #[arg(
        short = 'n',
        long = "nth",
        value_name = "N[,..]",
        value_parser = parse_field_indexes,
        help = "Restrict matching to these 1-based fields (negative counts from the end)"
    )]
    pub nth: Option<FieldIndexes>,
    #[arg(
        short = 'd',
        long,
        value_name = "REGEX",
        help = "Field delimiter pattern (default: AWK-style whitespace)"
    )]
    pub delimiter: Option<String>,
    #[arg(
        short = 's',
        long = "sort",
        value_name = "N",
        default_value_t = 1000,
        help = "Rank results when no more than N match"
    )]
    pub sort: usize,
    #[arg(long = "no-sort", overrides_with = "sort", help = "Keep results unsorted (+s)")]
    pub no_sort: bool,
    #[arg(short = 'm', long, help = "Allow selecting multiple lines with Tab")]
    pub multi: bool,
    #[arg(short = 'q', long, value_name = "STR", help = "Start with this query")]
    pub query: Option<String>,
    #[arg(
        short = '1',
        long = "select-1",
        help = "Automatically select a sole match once loaded"
    )]
    pub select_1: bool,
    #[arg(
        short = '0',
        long = "exit-0",
        help = "Exit successfully when nothing matches once loaded"
    )]
    pub exit_0: bool,
    #[arg(
        short = 'f',
        long,
        value_name = "STR",
        help = "Non-interactive filter: print matches for STR and exit"
    )]
    pub filter: Option<String>,
    #[arg(short = 'c', long = "color", overrides_with = "no_color", help = "Colored interface")]
    pub color: bool,
    #[arg(long = "no-color", overrides_with = "color", help = "Monochrome interface (+c)")]
    pub no_color: bool,
    #[arg(short = '2', long = "256", overrides_with = "no_256", help = "Force the 256-color palette")]
    pub force_256: bool,
    #[arg(long = "no-256", overrides_with = "force_256", help = "Stay on the 8-color palette (+2)")]
    pub no_256: bool,
    #[arg(long, help = "Force a black background")]
    pub black: bool,
    #[arg(long, overrides_with = "no_mouse", help = "Enable mouse support (default)")]
    pub mouse: bool,
    #[arg(long = "no-mouse", overrides_with = "mouse", help = "Disable mouse support")]
    pub no_mouse: bool,
    #[arg(
        long = "default-command",
        value_name = "CMD",
        env = crate::reader::DEFAULT_COMMAND_ENV,
        help = "Command producing candidates when stdin is a terminal"
    )]
    pub default_command: Option<String>,
}

/// Validated `--nth` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldIndexes(pub Vec<i32>);

fn parse_field_indexes(raw: &str) -> Result<FieldIndexes, String> {
    let mut indexes = Vec::new();
    for part in raw.split(',') {
        let index: i32 = part
            .trim()
            .parse()
            .map_err(|_| format!("invalid field index: {part}"))?;
        if index == 0 {
            return Err("field indexes are 1-based".to_string());
        }
        indexes.push(index);
    }
    if indexes.is_empty() {
        return Err("no field indexes given".to_string());
    }
    Ok(FieldIndexes(indexes))
}

impl CliArgs {
    /// Parse the environment defaults followed by the real argv.
    pub fn parse_with_defaults() -> Result<Self, clap::Error> {
        let mut argv: Vec<String> = vec!["sift".to_string()];
        if let Ok(defaults) = std::env::var(DEFAULT_OPTS_ENV) {
            argv.extend(split_shell_words(&defaults));
        }
        argv.extend(std::env::args().skip(1));
        Self::try_parse_from(normalize_legacy(argv))
    }

    pub fn matcher_kind(&self) -> MatcherKind {
        if self.extended_exact {
            MatcherKind::ExtendedExact
        } else if self.extended {
            MatcherKind::ExtendedFuzzy
        } else {
            MatcherKind::Fuzzy
        }
    }

    pub fn case_mode(&self) -> CaseMode {
        if self.case_sensitive {
            CaseMode::Sensitive
        } else if self.ignore_case {
            CaseMode::Insensitive
        } else {
            CaseMode::Smart
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            sort: !self.no_sort,
            sort_limit: self.sort,
        }
    }

    pub fn theme(&self) -> Theme {
        let ansi256 = if self.no_256 {
            false
        } else {
            self.force_256 || term_supports_256(std::env::var("TERM").ok().as_deref())
        };
        Theme::new(!self.no_color, self.black, ansi256)
    }

    pub fn mouse_enabled(&self) -> bool {
        !self.no_mouse
    }

    pub fn initial_query(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// Rewrite the historical `+flag` toggle forms into long options.
fn normalize_legacy(argv: Vec<String>) -> Vec<String> {
    argv.into_iter()
        .map(|arg| match arg.as_str() {
            "+i" => "--case-sensitive".to_string(),
            "+s" => "--no-sort".to_string(),
            "+c" => "--no-color".to_string(),
            "+2" => "--no-256".to_string(),
            _ => arg,
        })
        .collect()
}

/// Minimal POSIX-style word splitting: whitespace separates words, single
/// quotes are literal, double quotes and backslashes escape.
fn split_shell_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() && in_word => {
                words.push(std::mem::take(&mut current));
                in_word = false;
            }
            c if c.is_whitespace() => {}
            '\'' => {
                in_word = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_word = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' => {
                            if let Some(&escaped) = chars.peek() {
                                chars.next();
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
