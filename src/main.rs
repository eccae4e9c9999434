use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use midi_event_codec::{
    Args, Command, decode_to_midi, describe_tokens, encode_midi_file, load_tokens, parse_dataset,
    preprocess, save_tokens,
};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Encode { midi, output } => {
            info!("Encoding MIDI file: '{}'...", midi.display());
            let tokens = encode_midi_file(&midi)?;
            debug!("Events: {:?}", describe_tokens(&tokens));

            match output {
                Some(path) => {
                    save_tokens(&path, &tokens)?;
                    info!("Wrote {} token(s) to '{}'", tokens.len(), path.display());
                }
                None => println!("{}", serde_json::to_string(&tokens)?),
            }
        }
        Command::Decode {
            tokens,
            output,
            program,
        } => {
            info!("Decoding token file: '{}'...", tokens.display());
            let tokens = load_tokens(&tokens)?;
            let (notes, _) = decode_to_midi(&tokens, program, Some(&output))?;
            info!("Decoded {} note(s)..!", notes.len());
        }
        Command::Preprocess {
            dataset,
            root,
            output,
            seed,
        } => {
            let dataset = parse_dataset(&dataset)?;
            info!(
                "Preprocessing {:?} from '{}' into '{}'...",
                dataset,
                root.display(),
                output.display()
            );

            let summary = preprocess(dataset, &root, &output, seed)?;
            info!(
                "Done: {} file(s) encoded, {} skipped..!",
                summary.total(),
                summary.failed.len()
            );
        }
    }

    Ok(())
}
