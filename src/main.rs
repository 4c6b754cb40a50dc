use std::io::Write;
use std::process::ExitCode;
use std::sync::mpsc;

use anyhow::Result;

use sift::cli::CliArgs;
use sift::events::{Event, EventBus};
use sift::matcher::{FieldScope, Matcher};
use sift::reader::{self, PendingLines};
use sift::script::{self, Prescreen};
use sift::searcher::{self, SearchShared};
use sift::types::{Line, QuerySnapshot};
use sift::ui;

fn main() -> ExitCode {
    sift::logging::initialize();

    let args = match CliArgs::parse_with_defaults() {
        Ok(args) => args,
        Err(err) => {
            // Usage problems (and --help/--version) exit through clap's
            // printer; anything that is a real error maps to code 1.
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };

    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("sift: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: CliArgs) -> Result<u8> {
    let matcher = build_matcher(&args);

    let source = match reader::resolve_source(args.default_command.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("sift: {err:#}");
            return Ok(1);
        }
    };

    if let Some(query) = args.filter.as_deref() {
        let matches = script::run_filter(source, matcher, args.search_config(), query)?;
        let mut stdout = std::io::stdout().lock();
        for entry in matches.iter() {
            writeln!(stdout, "{}", entry.line)?;
        }
        return Ok(0);
    }

    let bus = EventBus::new();
    let pending = PendingLines::new();
    let shared = SearchShared::new();
    let (render_tx, render_rx) = mpsc::channel();

    let _reader = reader::spawn(source, pending.clone(), bus.clone());
    let _searcher = searcher::spawn(
        matcher,
        args.search_config(),
        shared.clone(),
        pending,
        bus.clone(),
        Some(render_tx.clone()),
    );
    bus.emit(Event::Key(QuerySnapshot::new(args.initial_query())));

    if args.select_1 || args.exit_0 {
        script::wait_until_settled(&shared)?;
        match script::decide(shared.matches().len(), args.select_1, args.exit_0) {
            Prescreen::PickSole => {
                let matches = shared.matches();
                return emit_selection(matches.iter().map(|entry| Line::clone(&entry.line)));
            }
            Prescreen::ExitEmpty => return Ok(0),
            Prescreen::Interactive => {}
        }
    }

    let options = ui::UiOptions {
        initial_query: args.initial_query().to_string(),
        multi: args.multi,
        mouse: args.mouse_enabled(),
        theme: args.theme(),
    };
    match ui::run(options, &shared, &bus, render_tx, render_rx)? {
        ui::Outcome::Commit(lines) => emit_selection(lines.into_iter()),
        ui::Outcome::Abort => Ok(1),
    }
}

/// The single place a successful selection reaches stdout.
fn emit_selection(lines: impl Iterator<Item = Line>) -> Result<u8> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(0)
}

fn build_matcher(args: &CliArgs) -> Matcher {
    let mut matcher = Matcher::new(args.matcher_kind(), args.case_mode());
    if let Some(fields) = &args.nth {
        matcher = matcher.with_fields(FieldScope::new(
            fields.0.clone(),
            args.delimiter.as_deref(),
        ));
    }
    matcher
}
