//! RTTTL header scanning and the lazy note cursor
//!
//! The header is scanned once per tune. Notes are decoded one at a time by
//! [`NoteParser`], which only ever looks at the next token; there is no random access.

use crate::duration::MAX_BPM;
use crate::error::RtttlError;
use crate::tune::{Header, NoteToken, PitchClass};

/// Where the parts of a tune live in its text
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TuneLayout {
    pub name_end: usize,
    pub notes_start: usize,
    pub header: Header,
}

fn is_separator(c: u8) -> bool {
    matches!(c, b' ' | b',' | b'\t' | b'\r' | b'\n')
}

/// Read a run of decimal digits, saturating instead of overflowing.
/// Returns `None` when there are no digits at `pos`.
fn scan_number(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let start = *pos;
    let mut value: u32 = 0;
    while let Some(c) = bytes.get(*pos).filter(|c| c.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add((c - b'0') as u32);
        *pos += 1;
    }
    if *pos == start {
        None
    } else {
        Some(value)
    }
}

/// Skip to the next `,` or `:` without consuming it
fn skip_header_value(bytes: &[u8], pos: &mut usize) {
    while let Some(&c) = bytes.get(*pos) {
        if c == b',' || c == b':' {
            break;
        }
        *pos += 1;
    }
}

/// Scan `Name:key=value,...:` and return the header plus section offsets.
///
/// Recognised keys are `d`, `o` and `b` (either case); other `key=value` pairs are
/// skipped. Keys that are not given keep their defaults (4, 6, 63). Tempo must be
/// in `1..=MAX_BPM`; above that a whole note would round down to nothing.
pub(crate) fn parse_header(text: &str) -> Result<TuneLayout, RtttlError> {
    let bytes = text.as_bytes();
    let name_end = text
        .find(':')
        .ok_or_else(|| RtttlError::malformed(text.len(), "missing ':' after tune name"))?;

    let mut header = Header::default();
    let mut pos = name_end + 1;

    loop {
        let c = match bytes.get(pos) {
            Some(&c) => c,
            None => return Err(RtttlError::malformed(pos, "missing ':' before note section")),
        };

        if c == b':' {
            pos += 1;
            break;
        }
        if is_separator(c) {
            pos += 1;
            continue;
        }

        if bytes.get(pos + 1) != Some(&b'=') {
            skip_header_value(bytes, &mut pos);
            continue;
        }

        let key = c.to_ascii_lowercase();
        pos += 2;
        if matches!(key, b'd' | b'o' | b'b') {
            let value_at = pos;
            let value = scan_number(bytes, &mut pos).ok_or_else(|| {
                RtttlError::malformed(value_at, format!("expected a number after '{}='", key as char))
            })?;
            match key {
                b'd' if value == 0 => {
                    return Err(RtttlError::malformed(value_at, "default duration must be non-zero"));
                }
                b'b' if value == 0 => {
                    return Err(RtttlError::malformed(value_at, "tempo must be non-zero"));
                }
                b'b' if value > MAX_BPM => {
                    return Err(RtttlError::malformed(
                        value_at,
                        format!("tempo must be at most {}", MAX_BPM),
                    ));
                }
                b'd' => header.default_duration = value,
                b'o' => header.default_octave = value.min(u8::MAX as u32) as u8,
                _ => header.bpm = value,
            }
        }
        skip_header_value(bytes, &mut pos);
    }

    Ok(TuneLayout {
        name_end,
        notes_start: pos,
        header,
    })
}

/// Cursor over a note section.
///
/// Positions are relative to the start of the note section; error positions are
/// absolute offsets into the full tune text.
///
/// # Example
/// ```
/// use rtttl::Tune;
///
/// let tune = Tune::parse("Scale:d=8,o=5,b=120:c,d,e")?;
/// let mut notes = tune.notes();
/// let first = notes.parse_next_note()?.unwrap();
/// assert_eq!(first.to_string(), "8c5");
/// assert_eq!(notes.count(), 2);
/// # Ok::<(), rtttl::RtttlError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NoteParser<'a> {
    src: &'a [u8],
    base: usize,
    pos: usize,
    defaults: Header,
}

impl<'a> NoteParser<'a> {
    /// `base` is the byte offset of `notes` within the whole tune text.
    pub fn new(notes: &'a str, base: usize, defaults: Header) -> Self {
        Self::resume(notes, base, defaults, 0)
    }

    pub fn resume(notes: &'a str, base: usize, defaults: Header, position: usize) -> Self {
        Self {
            src: notes.as_bytes(),
            base,
            pos: position.min(notes.len()),
            defaults,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Restart from the first note
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn error(&self, at: usize, message: &str) -> RtttlError {
        RtttlError::malformed(self.base + at, message)
    }

    fn skip_dots(&mut self) -> u8 {
        let mut dots: u8 = 0;
        while self.peek() == Some(b'.') {
            dots = dots.saturating_add(1);
            self.pos += 1;
        }
        dots
    }

    /// Decode the next note, or `Ok(None)` once the section is exhausted.
    ///
    /// Grammar: `[duration] letter [#] [.]* [octave] [.]*`. Dots are accepted on either
    /// side of the octave digit since both spellings occur in circulated ringtones.
    /// A letter outside `a`-`g`/`p` is consumed and decoded as a rest.
    pub fn parse_next_note(&mut self) -> Result<Option<NoteToken>, RtttlError> {
        while self.peek().is_some_and(is_separator) {
            self.pos += 1;
        }
        let start = self.pos;
        if self.peek().is_none() {
            return Ok(None);
        }

        let duration = match scan_number(self.src, &mut self.pos) {
            Some(0) => return Err(self.error(start, "note duration must be non-zero")),
            Some(d) => d,
            None => self.defaults.default_duration,
        };

        let letter_at = self.pos;
        let letter = match self.peek() {
            Some(c) if !is_separator(c) => c,
            _ => return Err(self.error(self.pos, "expected a note letter")),
        };
        self.pos += 1;
        // A multi-byte character is one letter
        while self.peek().is_some_and(|c| c & 0xC0 == 0x80) {
            self.pos += 1;
        }

        let pitch = PitchClass::from_letter(letter).unwrap_or_else(|| {
            tracing::warn!(
                "unknown note '{}' at byte {}, playing a rest",
                String::from_utf8_lossy(&self.src[letter_at..self.pos]),
                self.base + start
            );
            PitchClass::Rest
        });

        let mut sharp = false;
        let mut octave = self.defaults.default_octave;
        let mut dots = 0;

        // An unknown letter still owns its suffix so the next token starts cleanly
        if !letter.eq_ignore_ascii_case(&b'p') {
            if self.peek() == Some(b'#') {
                sharp = true;
                self.pos += 1;
            }
            dots = self.skip_dots();
            if let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                octave = c - b'0';
                self.pos += 1;
            }
        }
        dots = dots.saturating_add(self.skip_dots());

        Ok(Some(NoteToken {
            duration,
            pitch,
            sharp,
            octave,
            dots,
        }))
    }
}

impl Iterator for NoteParser<'_> {
    type Item = Result<NoteToken, RtttlError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next_note() {
            Ok(Some(note)) => Some(Ok(note)),
            Ok(None) => None,
            Err(e) => {
                self.pos = self.src.len();
                Some(Err(e))
            }
        }
    }
}
