//! Frame drawing: bottom-anchored prompt and status lines with the match
//! list growing upward, best match at the bottom.

use std::sync::Arc;

use indexmap::IndexSet;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthChar;

use crate::types::{Line, MatchList, Offset};

use super::theme::Theme;

const SPINNER_GLYPHS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
/// Gutter cells: pointer, marker, and one space of padding.
const GUTTER_WIDTH: u16 = 3;

/// Immutable view of everything the renderer needs for one frame.
#[derive(Clone)]
pub struct FrameSnapshot {
    pub query: String,
    /// Cursor position in character units.
    pub cursor: usize,
    pub matches: Arc<MatchList>,
    pub vcursor: usize,
    pub selected: IndexSet<Line>,
    pub multi: bool,
    pub count: usize,
    pub loaded: bool,
    pub spinner: usize,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            query: String::new(),
            cursor: 0,
            matches: Arc::new(Vec::new()),
            vcursor: 0,
            selected: IndexSet::new(),
            multi: false,
            count: 0,
            loaded: false,
            spinner: 0,
        }
    }
}

pub fn draw(frame: &mut Frame, snapshot: &FrameSnapshot, progress: Option<u8>, theme: &Theme) {
    let area = frame.area();
    if area.height == 0 || area.width == 0 {
        return;
    }

    let prompt_y = area.y + area.height - 1;
    draw_prompt(frame, snapshot, theme, Rect::new(area.x, prompt_y, area.width, 1));

    if area.height >= 2 {
        let status_y = prompt_y - 1;
        draw_status(
            frame,
            snapshot,
            progress,
            theme,
            Rect::new(area.x, status_y, area.width, 1),
        );
    }

    let list_height = area.height.saturating_sub(2);
    let visible = snapshot.matches.len().min(list_height as usize);
    for row in 0..visible {
        let y = area.y + list_height - 1 - row as u16;
        draw_row(frame, snapshot, row, theme, Rect::new(area.x, y, area.width, 1));
    }
}

fn draw_prompt(frame: &mut Frame, snapshot: &FrameSnapshot, theme: &Theme, area: Rect) {
    let text = TextLine::from(vec![
        Span::styled("> ", theme.prompt),
        Span::styled(snapshot.query.clone(), theme.normal),
    ]);
    frame.render_widget(Paragraph::new(text), area);

    let cursor_cols: usize = snapshot
        .query
        .chars()
        .take(snapshot.cursor)
        .map(|c| c.width().unwrap_or(0))
        .sum();
    let x = area.x + 2 + (cursor_cols as u16).min(area.width.saturating_sub(3));
    frame.set_cursor_position((x, area.y));
}

fn draw_status(
    frame: &mut Frame,
    snapshot: &FrameSnapshot,
    progress: Option<u8>,
    theme: &Theme,
    area: Rect,
) {
    let spinner = if snapshot.loaded {
        ' '
    } else {
        SPINNER_GLYPHS[snapshot.spinner % SPINNER_GLYPHS.len()]
    };
    let mut status = format!("{spinner} {}/{}", snapshot.matches.len(), snapshot.count);
    if snapshot.multi && !snapshot.selected.is_empty() {
        status.push_str(&format!(" ({})", snapshot.selected.len()));
    }
    if let Some(pct) = progress {
        status.push_str(&format!(" {pct}%"));
    }
    frame.render_widget(
        Paragraph::new(Span::styled(status, theme.info)),
        area,
    );
}

fn draw_row(frame: &mut Frame, snapshot: &FrameSnapshot, row: usize, theme: &Theme, area: Rect) {
    let entry = &snapshot.matches[row];
    let is_current = row == snapshot.vcursor;
    let is_selected = snapshot.selected.contains(&entry.line);

    let pointer = if is_current { '>' } else { ' ' };
    let marker = if is_selected { '>' } else { ' ' };
    let base = if is_current { theme.current } else { theme.normal };

    let width_budget = area.width.saturating_sub(GUTTER_WIDTH) as usize;
    let (text, offsets) = trim_to_width(&entry.line, &entry.offsets, width_budget);

    let mut spans = vec![
        Span::styled(pointer.to_string(), theme.pointer),
        Span::styled(marker.to_string(), theme.marker),
        Span::styled(" ", base),
    ];
    spans.extend(highlight_spans(&text, &offsets, base, base.patch(theme.highlight)));
    frame.render_widget(Paragraph::new(TextLine::from(spans)), area);
}

/// Fit `line` into `max` display columns, CJK and Hangul counting double.
///
/// When the line overflows: if the rightmost offset fits within `max - 2`
/// columns the tail is dropped and `..` appended; otherwise the head is
/// dropped, `..` prepended, and the offsets shifted and clamped onto the
/// visible remainder.
pub fn trim_to_width(line: &str, offsets: &[Offset], max: usize) -> (String, Vec<Offset>) {
    let offsets = merge_offsets(offsets);
    let total: usize = line.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max {
        return (line.to_string(), offsets);
    }
    if max <= 2 {
        return ("..".chars().take(max).collect(), Vec::new());
    }
    let budget = max - 2;

    let rightmost = offsets.iter().map(|&(_, end)| end).max().unwrap_or(0);
    let rightmost_cols: usize = line
        .char_indices()
        .take_while(|&(idx, _)| idx < rightmost)
        .map(|(_, c)| c.width().unwrap_or(0))
        .sum();

    if rightmost_cols <= budget {
        // Keep the head, drop the tail.
        let mut cols = 0;
        let mut kept_bytes = line.len();
        for (idx, c) in line.char_indices() {
            let next = cols + c.width().unwrap_or(0);
            if next > budget {
                kept_bytes = idx;
                break;
            }
            cols = next;
        }
        let text = format!("{}..", &line[..kept_bytes]);
        let trimmed = offsets
            .iter()
            .filter(|&&(begin, _)| begin < kept_bytes)
            .map(|&(begin, end)| (begin, end.min(kept_bytes)))
            .collect();
        (text, trimmed)
    } else {
        // Drop the head, keep everything up to and past the match.
        let mut cols = total;
        let mut removed_bytes = 0;
        for (idx, c) in line.char_indices() {
            if cols <= budget {
                removed_bytes = idx;
                break;
            }
            cols -= c.width().unwrap_or(0);
            removed_bytes = idx + c.len_utf8();
        }
        let text = format!("..{}", &line[removed_bytes..]);
        let len = text.len();
        let trimmed = offsets
            .iter()
            .map(|&(begin, end)| {
                let begin = (begin + 2).saturating_sub(removed_bytes).max(2);
                let end = (end + 2).saturating_sub(removed_bytes).clamp(begin, len);
                (begin, end)
            })
            .filter(|&(begin, end)| end > begin)
            .collect();
        (text, trimmed)
    }
}

/// Split `text` along the sorted offsets into alternating plain and
/// highlighted spans, dropping empty segments.
fn highlight_spans(
    text: &str,
    offsets: &[Offset],
    normal: ratatui::style::Style,
    highlight: ratatui::style::Style,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    for &(begin, end) in offsets {
        let begin = begin.min(text.len());
        let end = end.min(text.len());
        if begin > pos {
            spans.push(Span::styled(text[pos..begin].to_string(), normal));
        }
        if end > begin {
            spans.push(Span::styled(text[begin..end].to_string(), highlight));
        }
        pos = pos.max(end);
    }
    if pos < text.len() {
        spans.push(Span::styled(text[pos..].to_string(), normal));
    }
    spans
}

/// Collapse overlapping or touching offsets into disjoint sorted spans.
fn merge_offsets(offsets: &[Offset]) -> Vec<Offset> {
    let mut sorted: Vec<Offset> = offsets.to_vec();
    sorted.sort_unstable();
    let mut merged: Vec<Offset> = Vec::with_capacity(sorted.len());
    for (begin, end) in sorted {
        match merged.last_mut() {
            Some(last) if begin <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((begin, end)),
        }
    }
    merged
}
