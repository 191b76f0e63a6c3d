//! # Tune Types
//!
//! Owned, validated RTTTL melodies and the note tokens decoded from them.
//!
//! ## Format
//! ```text
//! Name:d=D,o=O,b=B:note,note,...
//!  │     │           └── note section: [duration]pitch[#][octave][.]* or [duration]p[.]*
//!  │     └── header: default duration, default octave, beats per minute
//!  └── free-form name
//! ```
//!
//! ## Ownership
//! [`Tune::parse`] copies the caller's text into an owned buffer, so the caller may
//! drop or reuse its string as soon as parsing returns. The whole note section is
//! checked once up front; after that, playback decodes notes lazily and cannot fail.
//!
//! ## Related Modules
//! - `parser` - Header scanning and the [`NoteParser`] cursor
//! - `frequency` - Pitch lookup used by [`NoteToken::frequency_hz`]
//! - `duration` - Millisecond arithmetic used by [`NoteToken::duration_ms`]

use std::fmt;

use serde::Serialize;

use crate::duration::calculate_duration;
use crate::error::RtttlError;
use crate::frequency::frequency;
use crate::parser::{parse_header, NoteParser};

/// Header defaults applied to notes that omit a duration or octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub default_duration: u32,
    pub default_octave: u8,
    pub bpm: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            default_duration: 4,
            default_octave: 6,
            bpm: 63,
        }
    }
}

/// Pitch class of a note, or a rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
    Rest,
}

impl PitchClass {
    /// Decode a note letter. `p` is a rest; anything else unknown is `None`.
    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            b'c' => Some(PitchClass::C),
            b'd' => Some(PitchClass::D),
            b'e' => Some(PitchClass::E),
            b'f' => Some(PitchClass::F),
            b'g' => Some(PitchClass::G),
            b'a' => Some(PitchClass::A),
            b'b' => Some(PitchClass::B),
            b'p' => Some(PitchClass::Rest),
            _ => None,
        }
    }

    /// Semitone offset from C, `None` for a rest
    pub fn semitone(self) -> Option<u8> {
        match self {
            PitchClass::C => Some(0),
            PitchClass::D => Some(2),
            PitchClass::E => Some(4),
            PitchClass::F => Some(5),
            PitchClass::G => Some(7),
            PitchClass::A => Some(9),
            PitchClass::B => Some(11),
            PitchClass::Rest => None,
        }
    }

    fn letter(self) -> char {
        match self {
            PitchClass::C => 'c',
            PitchClass::D => 'd',
            PitchClass::E => 'e',
            PitchClass::F => 'f',
            PitchClass::G => 'g',
            PitchClass::A => 'a',
            PitchClass::B => 'b',
            PitchClass::Rest => 'p',
        }
    }
}

/// One decoded note, with header defaults already applied.
///
/// # Fields
/// - `duration`: reciprocal note length (4 = quarter, 8 = eighth)
/// - `pitch`: pitch class or [`PitchClass::Rest`]
/// - `sharp`: raises the semitone by one, with no wraparound (`b#` indexes past B)
/// - `octave`: 0-9; octave 9 is outside the frequency table and plays as silence
/// - `dots`: each dot adds half of the previous extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteToken {
    pub duration: u32,
    pub pitch: PitchClass,
    pub sharp: bool,
    pub octave: u8,
    pub dots: u8,
}

impl NoteToken {
    pub fn is_rest(&self) -> bool {
        self.pitch == PitchClass::Rest
    }

    /// Semitone index within the octave, 12 for `b#`
    pub fn semitone(&self) -> Option<u8> {
        self.pitch
            .semitone()
            .map(|s| if self.sharp { s + 1 } else { s })
    }

    /// Frequency in Hz; 0.0 for rests and for notes outside the table.
    pub fn frequency_hz(&self) -> f32 {
        self.semitone()
            .map(|s| frequency(s, self.octave))
            .unwrap_or(0.0)
    }

    /// Unscaled length in milliseconds at `bpm`
    pub fn duration_ms(&self, bpm: u32) -> u32 {
        calculate_duration(self.duration, self.dots, bpm)
    }
}

impl fmt::Display for NoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.duration, self.pitch.letter())?;
        if !self.is_rest() {
            if self.sharp {
                f.write_str("#")?;
            }
            write!(f, "{}", self.octave)?;
        }
        for _ in 0..self.dots {
            f.write_str(".")?;
        }
        Ok(())
    }
}

/// An owned, validated RTTTL melody
#[derive(Debug, Clone, PartialEq)]
pub struct Tune {
    text: String,
    name_end: usize,
    notes_start: usize,
    header: Header,
}

impl Tune {
    /// Copy and validate `text`.
    ///
    /// # Errors
    /// [`RtttlError::MalformedTune`] when either `:` separator is missing, a header value
    /// is zero or not a number, or a note has a zero duration or no letter.
    ///
    /// # Example
    /// ```
    /// use rtttl::Tune;
    ///
    /// let tune = Tune::parse("Nokia:d=4,o=5,b=160:8e6,8d6,f#,8e6")?;
    /// assert_eq!(tune.name(), "Nokia");
    /// assert_eq!(tune.header().bpm, 160);
    /// assert_eq!(tune.notes().count(), 4);
    /// # Ok::<(), rtttl::RtttlError>(())
    /// ```
    pub fn parse(text: &str) -> Result<Tune, RtttlError> {
        let layout = parse_header(text)?;
        let tune = Tune {
            text: text.to_owned(),
            name_end: layout.name_end,
            notes_start: layout.notes_start,
            header: layout.header,
        };

        for note in tune.notes() {
            note?;
        }

        Ok(tune)
    }

    pub fn name(&self) -> &str {
        self.text[..self.name_end].trim()
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The note section, after the second `:`
    pub fn notes_text(&self) -> &str {
        &self.text[self.notes_start..]
    }

    /// A fresh cursor at the start of the note section
    pub fn notes(&self) -> NoteParser<'_> {
        NoteParser::new(self.notes_text(), self.notes_start, self.header)
    }

    /// Resume decoding at a cursor position previously taken from
    /// [`NoteParser::position`].
    pub fn notes_from(&self, position: usize) -> NoteParser<'_> {
        NoteParser::resume(self.notes_text(), self.notes_start, self.header, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_values() {
        let tune = Tune::parse("Test:d=8,o=5,b=120:c").unwrap();
        assert_eq!(tune.name(), "Test");
        assert_eq!(
            tune.header(),
            Header {
                default_duration: 8,
                default_octave: 5,
                bpm: 120
            }
        );
        assert_eq!(tune.notes_text(), "c");
    }

    #[test]
    fn test_missing_header_keys_use_defaults() {
        let tune = Tune::parse("Bare::c,d").unwrap();
        assert_eq!(tune.header(), Header::default());

        let tune = Tune::parse("Partial:b=200:c").unwrap();
        assert_eq!(tune.header().default_duration, 4);
        assert_eq!(tune.header().default_octave, 6);
        assert_eq!(tune.header().bpm, 200);
    }

    #[test]
    fn test_missing_separators() {
        let err = Tune::parse("NoColonsHere").unwrap_err();
        assert!(err.is_malformed());

        let err = Tune::parse("OneColon:d=4,o=5,b=100").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_caller_buffer_is_copied() {
        let mut source = String::from("Copy:d=4,o=5,b=100:c,d");
        let tune = Tune::parse(&source).unwrap();
        source.clear();
        source.push_str("garbage");
        assert_eq!(tune.text(), "Copy:d=4,o=5,b=100:c,d");
    }

    #[test]
    fn test_note_token_display() {
        let tune = Tune::parse("Fmt:d=4,o=5,b=100:8c#6.,p,16a,b..").unwrap();
        let rendered: Vec<String> = tune.notes().map(|n| n.unwrap().to_string()).collect();
        assert_eq!(rendered, vec!["8c#6.", "4p", "16a5", "4b5.."]);
    }

    #[test]
    fn test_note_frequency_and_duration() {
        let tune = Tune::parse("A:d=4,o=4,b=120:a,a#,p,b#8").unwrap();
        let notes: Vec<NoteToken> = tune.notes().map(|n| n.unwrap()).collect();

        assert!((notes[0].frequency_hz() - 440.0).abs() < 0.01);
        assert!((notes[1].frequency_hz() - 466.16).abs() < 0.01);
        assert_eq!(notes[2].frequency_hz(), 0.0);
        assert_eq!(notes[3].frequency_hz(), 0.0); // b#8 runs off the table
        assert_eq!(notes[0].duration_ms(120), 500);
    }
}
