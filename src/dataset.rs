use crate::codec::vocab::Token;
use crate::convert::encode_midi_file;
use anyhow::{Result, anyhow, bail};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metadata index shipped at the root of the MAESTRO dataset.
pub const MAESTRO_INDEX: &str = "maestro-v3.0.0.json";

/// Suffix appended to a source file name to name its token file.
pub const TOKEN_SUFFIX: &str = ".json";

const PROGRESS_EVERY: usize = 50;
const GIANT_TRAIN_FRACTION: f64 = 0.8;
const GIANT_VAL_FRACTION: f64 = 0.9;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Split names as written in the MAESTRO index.
    pub fn from_maestro(name: &str) -> Option<Self> {
        match name {
            "train" => Some(Split::Train),
            "validation" => Some(Split::Val),
            "test" => Some(Split::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Maestro,
    Giant,
}

/// One source file and the partition it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: PathBuf,
    pub split: Split,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct Summary {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub failed: Vec<PathBuf>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.train + self.val + self.test
    }

    fn record(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Val => self.val += 1,
            Split::Test => self.test += 1,
        }
    }
}

/// Columnar layout of the MAESTRO index: every column maps a row id to a value.
#[derive(Deserialize, Debug)]
struct MaestroIndex {
    midi_filename: HashMap<String, String>,
    split: HashMap<String, String>,
}

pub fn token_file_name(source: &Path) -> Result<String> {
    let name = source
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Source path {} has no file name..!", source.display()))?;

    Ok(format!("{}{}", name, TOKEN_SUFFIX))
}

pub fn prepare_split_dirs(output: &Path) -> Result<()> {
    for split in Split::ALL {
        let dir = output.join(split.dir_name());
        fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
    }
    Ok(())
}

pub fn save_tokens<P: AsRef<Path>>(path: P, tokens: &[Token]) -> Result<()> {
    let json = serde_json::to_vec(tokens)?;
    fs::write(path.as_ref(), json)
        .map_err(|e| anyhow!("Failed to write {}: {}", path.as_ref().display(), e))
}

pub fn load_tokens<P: AsRef<Path>>(path: P) -> Result<Vec<Token>> {
    let bytes = fs::read(path.as_ref())
        .map_err(|e| anyhow!("Failed to read {}: {}", path.as_ref().display(), e))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        anyhow!(
            "Failed to parse token file {}: {}",
            path.as_ref().display(),
            e
        )
    })
}

/// Jobs for a MAESTRO checkout, in index order.
pub fn maestro_jobs(root: &Path) -> Result<Vec<Job>> {
    let index_path = root.join(MAESTRO_INDEX);
    if !index_path.is_file() {
        bail!("Could not find file: {}", index_path.display());
    }

    let index: MaestroIndex = serde_json::from_slice(&fs::read(&index_path)?)
        .map_err(|e| anyhow!("Failed to parse {}: {}", index_path.display(), e))?;

    let mut rows: Vec<(usize, &String)> = index
        .midi_filename
        .iter()
        .map(|(id, name)| {
            id.parse::<usize>()
                .map(|n| (n, name))
                .map_err(|_| anyhow!("Invalid row id '{}' in {}", id, MAESTRO_INDEX))
        })
        .collect::<Result<_>>()?;
    rows.sort_by_key(|(n, _)| *n);

    info!("Found {} pieces", rows.len());

    let mut jobs: Vec<Job> = Vec::with_capacity(rows.len());
    for (n, name) in rows.into_iter() {
        let split_name = index
            .split
            .get(&n.to_string())
            .ok_or_else(|| anyhow!("No split recorded for row {} ({})", n, name))?;

        let Some(split) = Split::from_maestro(split_name) else {
            bail!("Unrecognized split type: {}", split_name);
        };

        jobs.push(Job {
            source: root.join(name),
            split,
        });
    }

    Ok(jobs)
}

/// Jobs for a flat directory of MIDI files, shuffled into an 80/10/10 split.
pub fn giant_jobs(root: &Path, seed: Option<u64>) -> Result<Vec<Job>> {
    let mut files: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| anyhow!("Failed to list {}: {}", root.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    files.shuffle(&mut rng);

    let total = files.len();
    let train_end = (total as f64 * GIANT_TRAIN_FRACTION) as usize;
    let val_end = (total as f64 * GIANT_VAL_FRACTION) as usize;

    info!("Found {} pieces", total);

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(i, source)| {
            let split = if i < train_end {
                Split::Train
            } else if i < val_end {
                Split::Val
            } else {
                Split::Test
            };
            Job { source, split }
        })
        .collect())
}

fn process_job(job: &Job, output: &Path) -> Result<PathBuf> {
    let tokens = encode_midi_file(&job.source)?;
    let target = output
        .join(job.split.dir_name())
        .join(token_file_name(&job.source)?);

    save_tokens(&target, &tokens)?;
    debug!("{} -> {}", job.source.display(), target.display());

    Ok(target)
}

/// Encode every job in parallel. A failing file is logged and skipped.
pub fn run_jobs(jobs: &[Job], output: &Path) -> Result<Summary> {
    prepare_split_dirs(output)?;

    let done = AtomicUsize::new(0);
    let total = jobs.len();

    let results: Vec<(Split, Result<PathBuf>)> = jobs
        .par_iter()
        .map(|job| {
            let result = process_job(job, output);

            let count = done.fetch_add(1, Ordering::Relaxed) + 1;
            if count % PROGRESS_EVERY == 0 {
                info!("{} / {}", count, total);
            }

            (job.split, result)
        })
        .collect();

    let mut summary = Summary::default();
    for ((split, result), job) in results.into_iter().zip(jobs.iter()) {
        match result {
            Ok(_) => summary.record(split),
            Err(e) => {
                warn!("Skipping {}: {:#}", job.source.display(), e);
                summary.failed.push(job.source.clone());
            }
        }
    }

    info!("Num Train: {}", summary.train);
    info!("Num Val: {}", summary.val);
    info!("Num Test: {}", summary.test);
    if !summary.failed.is_empty() {
        warn!("{} file(s) failed to encode..!", summary.failed.len());
    }

    Ok(summary)
}

pub fn preprocess(
    dataset: Dataset,
    root: &Path,
    output: &Path,
    seed: Option<u64>,
) -> Result<Summary> {
    let jobs = match dataset {
        Dataset::Maestro => maestro_jobs(root)?,
        Dataset::Giant => giant_jobs(root, seed)?,
    };

    info!("Preprocessing {} file(s)...", jobs.len());
    run_jobs(&jobs, output)
}
