use crate::tlog;

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{LoadEvent, LoadEventKind, LoadOutcome, LogData};

const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IndexMode {
    /// Index from offset 0, discarding what was known.
    Full,
    /// Continue after the last complete line; falls back to `Full` when the
    /// file got shorter than what was indexed.
    Update,
}

pub(super) fn run(
    data: Arc<LogData>,
    path: PathBuf,
    mode: IndexMode,
    generation: u64,
    stop: Arc<AtomicBool>,
) {
    let outcome = match index_file(&data, &path, mode, generation, &stop) {
        Ok(true) => LoadOutcome::Completed,
        Ok(false) => LoadOutcome::Interrupted,
        Err(e) => LoadOutcome::Failed(e.to_string()),
    };

    match &outcome {
        LoadOutcome::Failed(reason) => {
            tlog!(error, "indexing {} failed: {}", path.display(), reason)
        }
        other => tlog!(
            info,
            "indexing {} finished: {:?} ({} lines)",
            path.display(),
            other,
            data.line_count()
        ),
    }

    data.notify(LoadEvent {
        generation,
        kind: LoadEventKind::Finished(outcome),
    });
}

/// Returns `Ok(false)` when stopped before reaching the end of the file.
fn index_file(
    data: &LogData,
    path: &Path,
    mode: IndexMode,
    generation: u64,
    stop: &AtomicBool,
) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let meta = file.metadata()?;
    if meta.is_dir() {
        return Err(std::io::Error::other("is a directory"));
    }
    let size = meta.len();
    let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);

    let start = {
        let mut index = data.write_index();
        match mode {
            IndexMode::Update if size >= index.indexed_size => index.complete_end(),
            _ => {
                index.clear();
                0
            }
        }
    };
    file.seek(SeekFrom::Start(start))?;

    let total = size.saturating_sub(start);
    let mut offset = start;
    let mut last_percent = 0u8;
    let mut buf = vec![0u8; CHUNK_SIZE];

    data.notify(LoadEvent {
        generation,
        kind: LoadEventKind::Progress(0),
    });

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(false);
        }

        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }

        let ends: Vec<u64> = buf[..n]
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .map(|(i, _)| offset + i as u64 + 1)
            .collect();
        offset += n as u64;

        {
            let mut index = data.write_index();
            index.line_ends.extend(ends);
            index.indexed_size = offset;
        }

        let percent = progress_percent(offset - start, total);
        if percent > last_percent {
            last_percent = percent;
            data.notify(LoadEvent {
                generation,
                kind: LoadEventKind::Progress(percent),
            });
        }
    }

    let mut index = data.write_index();
    index.indexed_size = offset;
    index.last_modified = last_modified;
    Ok(true)
}

fn progress_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}
