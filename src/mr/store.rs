//! The Intermediate Store: deterministic file naming, input splitting, the
//! map and reduce operators, the final merge, and bulk cleanup.
//!
//! All state lives on disk, keyed by the job's input path; nothing here is
//! held in memory between calls. This is what lets any worker execute any
//! task without the master shipping bulk data around.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A single key-value record, as produced by the user map function and
/// consumed by the user reduce function.
///
/// Serialised one-per-line as a JSON object; a decode failure on one line is
/// treated as end-of-stream for that file rather than a hard error (see
/// `execute_reduce` and `merge`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// FNV-1a, 32-bit, over raw UTF-8 key bytes. Implementations that don't
/// match this exactly are not bucket-compatible with each other.
pub fn fnv1a32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn dir_and_file(input_path: &str) -> (PathBuf, String) {
    let path = Path::new(input_path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(input_path)
        .to_string();
    (dir, file)
}

/// `D/mapreduce-tmp.F-<m>`
pub fn split_name(input_path: &str, m: i32) -> PathBuf {
    let (dir, file) = dir_and_file(input_path);
    dir.join(format!("mapreduce-tmp.{}-{}", file, m))
}

/// `D/mapreduce-tmp.F-<m>-<r>`
pub fn bucket_name(input_path: &str, m: i32, r: i32) -> PathBuf {
    let (dir, file) = dir_and_file(input_path);
    dir.join(format!("mapreduce-tmp.{}-{}-{}", file, m, r))
}

/// `D/mapreduce-tmp.F-result-<r>`
pub fn merged_name(input_path: &str, r: i32) -> PathBuf {
    let (dir, file) = dir_and_file(input_path);
    dir.join(format!("mapreduce-tmp.{}-result-{}", file, r))
}

/// `D/mapreduce-tmp.F`
pub fn output_name(input_path: &str) -> PathBuf {
    let (dir, file) = dir_and_file(input_path);
    dir.join(format!("mapreduce-tmp.{}", file))
}

/// Splits `input_path` into up to `n_map` newline-aligned chunks.
///
/// Target chunk size is `ceil(size / n_map) + 1` bytes; a new split file is
/// opened the first time the running byte count exceeds `chunk * m`. Small
/// inputs may produce fewer than `n_map` files - this is accepted, not
/// patched over (see `execute_map`).
///
/// Returns the number of split files actually written.
pub fn split(input_path: &str, n_map: i32) -> Result<usize> {
    let file = File::open(input_path)
        .with_context(|| format!("cannot open input file {}", input_path))?;
    let size = file
        .metadata()
        .with_context(|| format!("cannot stat input file {}", input_path))?
        .len();
    let chunk = size / n_map as u64 + 1;

    let reader = BufReader::new(file);
    let mut m: i32 = 0;
    let mut writer = BufWriter::new(
        File::create(split_name(input_path, m))
            .with_context(|| "cannot create split file".to_string())?,
    );
    let mut created = 1usize;
    let mut running: u64 = 0;

    for line in reader.lines() {
        let line = line.with_context(|| format!("cannot read line from {}", input_path))?;
        if running > chunk * (m as u64 + 1) {
            writer.flush()?;
            m += 1;
            writer = BufWriter::new(
                File::create(split_name(input_path, m))
                    .with_context(|| "cannot create split file".to_string())?,
            );
            created += 1;
        }
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        running += line.len() as u64 + 1;
    }
    writer.flush()?;
    Ok(created)
}

/// Runs the user map function over split `m` and partitions its output into
/// `n_reduce` bucket files by `fnv1a32(key) % n_reduce`.
///
/// All `n_reduce` bucket files are created even if empty, so that
/// `execute_reduce` can always open every `(m, r)` pair it expects. A
/// missing split file (see `split`) degrades to an empty input rather than
/// failing the task.
pub fn execute_map(
    input_path: &str,
    m: i32,
    n_reduce: i32,
    map_fn: &dyn Fn(&str) -> Vec<KeyValue>,
) -> Result<()> {
    let split_path = split_name(input_path, m);
    let mut contents = String::new();
    match File::open(&split_path) {
        Ok(mut f) => {
            f.read_to_string(&mut contents)
                .with_context(|| format!("cannot read split {}", split_path.display()))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Open question in the design: treat an absent split as empty
            // input rather than failing map task #m.
        }
        Err(e) => return Err(e).with_context(|| format!("cannot open split {}", split_path.display())),
    }

    let pairs = map_fn(&contents);

    let mut writers = Vec::with_capacity(n_reduce as usize);
    for r in 0..n_reduce {
        let path = bucket_name(input_path, m, r);
        writers.push(
            BufWriter::new(
                File::create(&path).with_context(|| format!("cannot create bucket {}", path.display()))?,
            ),
        );
    }

    for kv in pairs {
        let r = (fnv1a32(kv.key.as_bytes()) % n_reduce as u32) as usize;
        serde_json::to_writer(&mut writers[r], &kv)
            .with_context(|| "cannot encode intermediate record".to_string())?;
        writers[r].write_all(b"\n")?;
    }

    for w in writers.iter_mut() {
        w.flush()?;
    }
    Ok(())
}

/// Reads the `n_map` bucket files for reduce task `r`, groups values by key
/// (preserving emission order within and across buckets), and writes one
/// reduced record per distinct key to the merged reducer file for `r`.
pub fn execute_reduce(
    input_path: &str,
    r: i32,
    n_map: i32,
    reduce_fn: &dyn Fn(&str, Vec<String>) -> String,
) -> Result<()> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for m in 0..n_map {
        let path = bucket_name(input_path, m, r);
        let file = File::open(&path)
            .with_context(|| format!("cannot open bucket {}", path.display()))?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line.with_context(|| format!("cannot read bucket {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<KeyValue>(&line) {
                Ok(kv) => grouped.entry(kv.key).or_default().push(kv.value),
                // Permissive recovery: a malformed record ends this file's stream.
                Err(_) => break,
            }
        }
    }

    let out_path = merged_name(input_path, r);
    let mut writer = BufWriter::new(
        File::create(&out_path).with_context(|| format!("cannot create {}", out_path.display()))?,
    );
    for (key, values) in grouped {
        let value = reduce_fn(&key, values);
        let kv = KeyValue::new(key, value);
        serde_json::to_writer(&mut writer, &kv)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a single merged reducer file into `(key, value)` pairs.
fn read_merged(input_path: &str, r: i32) -> Result<Vec<(String, String)>> {
    let path = merged_name(input_path, r);
    let file = File::open(&path).with_context(|| format!("cannot open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("cannot read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<KeyValue>(&line) {
            Ok(kv) => out.push((kv.key, kv.value)),
            Err(_) => break,
        }
    }
    Ok(out)
}

/// Collates all `n_reduce` merged reducer files into the final sorted
/// `key<TAB>value` output file.
///
/// Reducer files are read in parallel (there's no ordering dependency
/// between them), then folded into the key->value map sequentially in
/// ascending reducer order so that, on the rare case of a key produced by
/// more than one reducer, the last write still wins deterministically.
pub fn merge(input_path: &str, n_reduce: i32) -> Result<()> {
    let per_reducer: Result<Vec<Vec<(String, String)>>> = (0..n_reduce)
        .into_par_iter()
        .map(|r| read_merged(input_path, r))
        .collect();
    let per_reducer = per_reducer?;

    let mut kvs: HashMap<String, String> = HashMap::new();
    for pairs in per_reducer {
        for (key, value) in pairs {
            kvs.insert(key, value);
        }
    }

    let mut keys: Vec<&String> = kvs.keys().collect();
    keys.sort();

    let out_path = output_name(input_path);
    let mut writer = BufWriter::new(
        File::create(&out_path).with_context(|| format!("cannot create {}", out_path.display()))?,
    );
    for key in keys {
        writeln!(writer, "{}\t{}", key, kvs[key])?;
    }
    writer.flush()?;
    Ok(())
}

/// Removes every split, bucket, merged reducer, and final output file for a
/// job. Not idempotent: a missing file is propagated as an error, matching
/// the fatal-on-filesystem-error policy elsewhere in the store.
pub fn clean_up(input_path: &str, n_map: i32, n_reduce: i32) -> Result<()> {
    for m in 0..n_map {
        let p = split_name(input_path, m);
        std::fs::remove_file(&p).with_context(|| format!("cannot remove {}", p.display()))?;
        for r in 0..n_reduce {
            let p = bucket_name(input_path, m, r);
            std::fs::remove_file(&p).with_context(|| format!("cannot remove {}", p.display()))?;
        }
    }
    for r in 0..n_reduce {
        let p = merged_name(input_path, r);
        std::fs::remove_file(&p).with_context(|| format!("cannot remove {}", p.display()))?;
    }
    let p = output_name(input_path);
    std::fs::remove_file(&p).with_context(|| format!("cannot remove {}", p.display()))?;
    Ok(())
}
