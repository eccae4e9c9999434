use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "midi_event_codec",
    about = "Turn MIDI performances into event tokens for sequence models, and back!"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a single MIDI file into a token sequence.
    Encode {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Where to write the tokens as JSON. Prints them to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a JSON token file back into a MIDI file.
    Decode {
        /// Path to a JSON array of tokens.
        tokens: PathBuf,

        /// Path of the MIDI file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// General MIDI program number for the decoded track.
        #[arg(short, long, default_value_t = 0)]
        program: u8,
    },

    /// Encode a whole dataset into train/val/test token files.
    Preprocess {
        /// Dataset layout of the root directory: maestro|giant.
        #[arg(short, long, default_value = "maestro")]
        dataset: String,

        /// Root directory of the dataset.
        #[arg(short, long)]
        root: PathBuf,

        /// Output directory; train/, val/ and test/ are created inside it.
        #[arg(short, long, default_value = "./dataset/e_piano")]
        output: PathBuf,

        /// Seed for the random split of flat datasets, for reproducible partitions.
        #[arg(long)]
        seed: Option<u64>,
    },
}
