use crate::codec::vocab::Token;
use crate::codec::{decode_with_report, encode_performance_with_report};
use crate::midi_importer::import_midi_file;
use crate::midi_writer::write_midi;
use crate::model::performance::Note;
use anyhow::{Result, anyhow};
use log::{debug, info};
use midly::Smf;
use std::path::Path;

/// Read a MIDI file and encode all of its instruments into one token sequence.
pub fn encode_midi_file<P: AsRef<Path>>(path: P) -> Result<Vec<Token>> {
    let performance = import_midi_file(path.as_ref())?;

    let encoded = encode_performance_with_report(&performance)
        .map_err(|e| anyhow!("Failed to encode {}: {}", path.as_ref().display(), e))?;

    debug!(
        "Encoded '{}': {} note(s) -> {} token(s), {} pedal event(s) absorbed",
        path.as_ref().display(),
        performance.note_count(),
        encoded.tokens.len(),
        encoded.absorbed.len()
    );

    Ok(encoded.tokens)
}

/// Decode tokens into notes and hand them to the MIDI writer.
///
/// The file is only written when `path` is given; the in-memory SMF is always returned.
pub fn decode_to_midi(
    tokens: &[Token],
    program: u8,
    path: Option<&Path>,
) -> Result<(Vec<Note>, Smf<'static>)> {
    let merged = decode_with_report(tokens)?;

    if !merged.dropped.is_empty() {
        info!(
            "Dropped {} malformed event(s) while decoding..!",
            merged.dropped.len()
        );
    }

    let smf = write_midi(&merged.notes, program, path)?;
    Ok((merged.notes, smf))
}
