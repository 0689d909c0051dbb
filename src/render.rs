//! Incremental rendering of model output with colour markup.
//!
//! The model marks added and removed code with one of two conventions. Exactly one is
//! requested per prompt (see [`MarkupScheme`]) and the renderer only recognises that one.
//!
//! While streaming, anything that could still turn out to be part of a marker is held
//! back: an open tag without its close tag, or a trailing fragment such as `[AD` or `\03`.
//! Text is only written once it can no longer change, so the streamed bytes always equal
//! [`render`] applied to the complete response.

use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use serde::{Deserialize, Serialize};

pub const ADD_COLOR: Color = Color::DarkGreen;
pub const DEL_COLOR: Color = Color::DarkRed;

/// Literal escape prefix the model writes in [`MarkupScheme::Ansi`] output.
const ESCAPE_LITERAL: &str = "\\033";
const ESCAPE: &str = "\x1b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarkupScheme {
    /// `[ADD]new[/ADD]` and `[DEL]old[/DEL]`.
    #[default]
    Brackets,
    /// Raw `\033[32;1m ... \033[0m` sequences spelled out as text.
    Ansi,
}

struct Span {
    open: &'static str,
    close: &'static str,
    color: Color,
}

const BRACKET_SPANS: &[Span] = &[
    Span {
        open: "[ADD]",
        close: "[/ADD]",
        color: ADD_COLOR,
    },
    Span {
        open: "[DEL]",
        close: "[/DEL]",
        color: DEL_COLOR,
    },
];

const BRACKET_TOKENS: &[&str] = &["[ADD]", "[/ADD]", "[DEL]", "[/DEL]"];
const ANSI_TOKENS: &[&str] = &["\\033[32;1m", "\\033[31;1m", "\\033[0m"];

impl MarkupScheme {
    fn spans(self) -> &'static [Span] {
        match self {
            MarkupScheme::Brackets => BRACKET_SPANS,
            // Escape sequences delimit themselves; the terminal does the pairing.
            MarkupScheme::Ansi => &[],
        }
    }

    fn tokens(self) -> &'static [&'static str] {
        match self {
            MarkupScheme::Brackets => BRACKET_TOKENS,
            MarkupScheme::Ansi => ANSI_TOKENS,
        }
    }

    fn push_plain(self, text: &str, out: &mut String) {
        match self {
            MarkupScheme::Brackets => out.push_str(text),
            MarkupScheme::Ansi => out.push_str(&text.replace(ESCAPE_LITERAL, ESCAPE)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// More text may follow: hold back anything undecided.
    Streaming,
    /// Input is complete: undecided markers are emitted literally.
    Final,
}

/// Escape sequence that starts a bold span in `color`.
pub fn bold(color: Color) -> String {
    format!("{}{}", SetForegroundColor(color), SetAttribute(Attribute::Bold))
}

/// Escape sequence that ends a span.
pub fn reset() -> String {
    ResetColor.to_string()
}

/// Render a complete response in one shot.
pub fn render(scheme: MarkupScheme, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    resolve_into(scheme, text, Mode::Final, &mut out);
    out
}

fn resolve_into(scheme: MarkupScheme, text: &str, mode: Mode, out: &mut String) {
    let mut rest = text;
    loop {
        let Some((at, span)) = earliest_open(scheme.spans(), rest) else {
            let keep = match mode {
                Mode::Streaming => pending_marker_start(rest, scheme.tokens()),
                Mode::Final => rest.len(),
            };
            scheme.push_plain(&rest[..keep], out);
            return;
        };

        scheme.push_plain(&rest[..at], out);
        let inner_start = &rest[at + span.open.len()..];

        match inner_start.find(span.close) {
            Some(end) => {
                out.push_str(&bold(span.color));
                resolve_into(scheme, &inner_start[..end], Mode::Final, out);
                out.push_str(&reset());
                rest = &inner_start[end + span.close.len()..];
            }
            None => match mode {
                Mode::Streaming => return,
                Mode::Final => {
                    out.push_str(span.open);
                    rest = inner_start;
                }
            },
        }
    }
}

fn earliest_open<'a>(spans: &'a [Span], text: &str) -> Option<(usize, &'a Span)> {
    spans
        .iter()
        .filter_map(|span| text.find(span.open).map(|at| (at, span)))
        .min_by_key(|(at, _)| *at)
}

/// Byte offset where the longest suffix of `text` that is a proper prefix of one of
/// `tokens` begins, or `text.len()` if there is no such suffix.
fn pending_marker_start(text: &str, tokens: &[&str]) -> usize {
    let longest = tokens.iter().map(|t| t.len()).max().unwrap_or(0);
    let floor = text.len().saturating_sub(longest.saturating_sub(1));

    (floor..text.len())
        .filter(|&i| text.is_char_boundary(i))
        .find(|&i| {
            let tail = &text[i..];
            tokens
                .iter()
                .any(|token| token.len() > tail.len() && token.starts_with(tail))
        })
        .unwrap_or(text.len())
}

/// Accumulates streamed chunks and hands back only newly confirmed output.
#[derive(Debug)]
pub struct Renderer {
    scheme: MarkupScheme,
    raw: String,
    flushed: usize,
}

impl Renderer {
    pub fn new(scheme: MarkupScheme) -> Self {
        Self {
            scheme,
            raw: String::new(),
            flushed: 0,
        }
    }

    /// Feed one chunk. Returns the text that became printable, if any.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.raw.push_str(chunk);
        let mut resolved = String::with_capacity(self.raw.len());
        resolve_into(self.scheme, &self.raw, Mode::Streaming, &mut resolved);
        self.take_new(resolved)
    }

    /// End of stream: everything still held back is emitted, unresolved markers literally.
    pub fn finish(&mut self) -> Option<String> {
        let resolved = render(self.scheme, &self.raw);
        self.take_new(resolved)
    }

    /// Bytes of rendered output handed out so far.
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    fn take_new(&mut self, resolved: String) -> Option<String> {
        debug_assert!(resolved.len() >= self.flushed);
        let fresh = resolved.get(self.flushed..).filter(|s| !s.is_empty())?;
        let fresh = fresh.to_string();
        self.flushed = resolved.len();
        Some(fresh)
    }
}
