//! External-memory sort over a configurable RAM budget.
//!
//! Two entry points, mirroring the two record shapes the builder deals with:
//! [`sort_fixed`] for fixed-width `Pod` records, and [`sort_variable`] for
//! length-prefixed byte blobs (the prefix is a little-endian `u16`).
//!
//! Both work the same way: fill a buffer up to the RAM budget, sort it
//! in-place, flush it to a numbered run file under `tmp_dir`, repeat until
//! the input is exhausted, then k-way merge the runs with a min-heap over
//! the current head of each run. A `keep(record, output_index) -> bool` hook
//! runs once per record in final sorted order and decides whether the record
//! is actually emitted — used both for dedup-against-previous-emitted and for
//! recording a sorted-position-to-source-id mapping as a side effect.
//!
//! Fast paths: an input that fits in a single run skips temp files entirely
//! and sorts straight from RAM; an input that produced exactly one run is
//! re-emitted from that run without a merge pass.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{SortError, SortResult};

/// Sorts a stream of fixed-size `Pod` records.
///
/// `compare` need not be a strict total order (ties are broken by input
/// order is *not* guaranteed — stability is explicitly not required, per the
/// external-sort contract).
pub fn sort_fixed<T, C, K, E>(
    input: impl IntoIterator<Item = T>,
    ram_budget_bytes: usize,
    tmp_dir: &Path,
    mut compare: C,
    mut keep: K,
    mut emit: E,
) -> SortResult<usize>
where
    T: bytemuck::Pod,
    C: FnMut(&T, &T) -> Ordering,
    K: FnMut(&T, usize) -> bool,
    E: FnMut(T),
{
    let record_size = std::mem::size_of::<T>().max(1);
    let chunk_capacity = (ram_budget_bytes / record_size).max(1);

    let mut runs: Vec<PathBuf> = Vec::new();
    let mut buffer: Vec<T> = Vec::with_capacity(chunk_capacity);
    let mut run_no = 0usize;
    let mut iter = input.into_iter();

    loop {
        buffer.clear();
        let mut exhausted = false;
        while buffer.len() < chunk_capacity {
            match iter.next() {
                Some(r) => buffer.push(r),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        if buffer.is_empty() {
            break;
        }

        buffer.sort_by(|a, b| compare(a, b));

        // Fast path: everything fit in the first chunk, so there was never a
        // need to spill to disk at all.
        if exhausted && runs.is_empty() {
            let mut count = 0usize;
            for r in buffer.drain(..) {
                if keep(&r, count) {
                    emit(r);
                    count += 1;
                }
            }
            return Ok(count);
        }

        write_run_fixed(tmp_dir, run_no, &buffer)?;
        runs.push(run_path(tmp_dir, run_no));
        run_no += 1;

        if exhausted {
            break;
        }
    }

    // Fast path: exactly one run was written, re-emit it without merging.
    if runs.len() == 1 {
        let records = read_run_fixed::<T>(&runs[0])?;
        let mut count = 0usize;
        for r in records {
            if keep(&r, count) {
                emit(r);
                count += 1;
            }
        }
        for p in &runs {
            let _ = std::fs::remove_file(p);
        }
        return Ok(count);
    }

    let count = merge_runs_fixed(&runs, &mut compare, &mut keep, &mut emit)?;
    for p in &runs {
        let _ = std::fs::remove_file(p);
    }
    Ok(count)
}

fn run_path(tmp_dir: &Path, run_no: usize) -> PathBuf {
    tmp_dir.join(format!("sort-run-{run_no:06}.tmp"))
}

fn write_run_fixed<T: bytemuck::Pod>(tmp_dir: &Path, run_no: usize, records: &[T]) -> SortResult<()> {
    std::fs::create_dir_all(tmp_dir).map_err(SortError::TempDir)?;
    let path = run_path(tmp_dir, run_no);
    let file = File::create(&path).map_err(|e| SortError::WriteRun {
        path: path.clone(),
        source: e,
    })?;
    let mut w = BufWriter::new(file);
    let bytes: &[u8] = bytemuck::cast_slice(records);
    w.write_all(bytes).map_err(|e| SortError::WriteRun { path, source: e })?;
    Ok(())
}

fn read_run_fixed<T: bytemuck::Pod>(path: &Path) -> SortResult<Vec<T>> {
    let mut file = File::open(path).map_err(|e| SortError::ReadRun {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| SortError::ReadRun {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}

struct RunCursor<T> {
    records: std::vec::IntoIter<T>,
    head: Option<T>,
}

fn merge_runs_fixed<T, C, K, E>(
    run_paths: &[PathBuf],
    compare: &mut C,
    keep: &mut K,
    emit: &mut E,
) -> SortResult<usize>
where
    T: bytemuck::Pod,
    C: FnMut(&T, &T) -> Ordering,
    K: FnMut(&T, usize) -> bool,
    E: FnMut(T),
{
    let mut cursors: Vec<RunCursor<T>> = Vec::with_capacity(run_paths.len());
    for p in run_paths {
        let records = read_run_fixed::<T>(p)?;
        let mut it = records.into_iter();
        let head = it.next();
        cursors.push(RunCursor { records: it, head });
    }

    let mut count = 0usize;
    loop {
        let mut best: Option<usize> = None;
        for (i, c) in cursors.iter().enumerate() {
            if let Some(r) = &c.head {
                match best {
                    None => best = Some(i),
                    Some(b) => {
                        if compare(r, cursors[b].head.as_ref().unwrap()) == Ordering::Less {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        let Some(i) = best else { break };
        let record = cursors[i].head.take().unwrap();
        cursors[i].head = cursors[i].records.next();

        if keep(&record, count) {
            emit(record);
            count += 1;
        }
    }

    Ok(count)
}

/// Sorts length-prefixed variable-size byte records (`u16` little-endian
/// length, then that many bytes). Used for variable-width data such as way
/// name blobs or turn-relation auxiliary payloads.
pub fn sort_variable<C, K, E>(
    input: impl IntoIterator<Item = Vec<u8>>,
    ram_budget_bytes: usize,
    tmp_dir: &Path,
    mut compare: C,
    mut keep: K,
    mut emit: E,
) -> SortResult<usize>
where
    C: FnMut(&[u8], &[u8]) -> Ordering,
    K: FnMut(&[u8], usize) -> bool,
    E: FnMut(Vec<u8>),
{
    let mut runs: Vec<PathBuf> = Vec::new();
    let mut buffer: Vec<Vec<u8>> = Vec::new();
    let mut buffer_bytes = 0usize;
    let mut run_no = 0usize;

    std::fs::create_dir_all(tmp_dir).map_err(SortError::TempDir)?;

    for record in input {
        if record.len() > ram_budget_bytes {
            return Err(SortError::RecordTooLarge(record.len(), ram_budget_bytes));
        }
        if buffer_bytes + record.len() > ram_budget_bytes && !buffer.is_empty() {
            buffer.sort_by(|a, b| compare(a, b));
            write_run_variable(tmp_dir, run_no, &buffer)?;
            runs.push(run_path(tmp_dir, run_no));
            run_no += 1;
            buffer.clear();
            buffer_bytes = 0;
        }
        buffer_bytes += record.len();
        buffer.push(record);
    }

    if runs.is_empty() {
        buffer.sort_by(|a, b| compare(a, b));
        let mut count = 0usize;
        for r in buffer {
            if keep(&r, count) {
                emit(r);
                count += 1;
            }
        }
        return Ok(count);
    }

    if !buffer.is_empty() {
        buffer.sort_by(|a, b| compare(a, b));
        write_run_variable(tmp_dir, run_no, &buffer)?;
        runs.push(run_path(tmp_dir, run_no));
    }

    if runs.len() == 1 {
        let records = read_run_variable(&runs[0])?;
        let mut count = 0usize;
        for r in records {
            if keep(&r, count) {
                emit(r);
                count += 1;
            }
        }
        for p in &runs {
            let _ = std::fs::remove_file(p);
        }
        return Ok(count);
    }

    let mut cursors: Vec<RunCursor<Vec<u8>>> = Vec::with_capacity(runs.len());
    for p in &runs {
        let records = read_run_variable(p)?;
        let mut it = records.into_iter();
        let head = it.next();
        cursors.push(RunCursor { records: it, head });
    }

    let mut count = 0usize;
    loop {
        let mut best: Option<usize> = None;
        for (i, c) in cursors.iter().enumerate() {
            if let Some(r) = &c.head {
                match best {
                    None => best = Some(i),
                    Some(b) => {
                        if compare(r, cursors[b].head.as_ref().unwrap()) == Ordering::Less {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        let Some(i) = best else { break };
        let record = cursors[i].head.take().unwrap();
        cursors[i].head = cursors[i].records.next();
        if keep(&record, count) {
            emit(record);
            count += 1;
        }
    }

    for p in &runs {
        let _ = std::fs::remove_file(p);
    }
    Ok(count)
}

fn write_run_variable(tmp_dir: &Path, run_no: usize, records: &[Vec<u8>]) -> SortResult<()> {
    let path = run_path(tmp_dir, run_no);
    let file = File::create(&path).map_err(|e| SortError::WriteRun {
        path: path.clone(),
        source: e,
    })?;
    let mut w = BufWriter::new(file);
    for r in records {
        let len = r.len() as u16;
        w.write_all(&len.to_le_bytes())
            .map_err(|e| SortError::WriteRun { path: path.clone(), source: e })?;
        w.write_all(r).map_err(|e| SortError::WriteRun { path: path.clone(), source: e })?;
    }
    Ok(())
}

fn read_run_variable(path: &Path) -> SortResult<Vec<Vec<u8>>> {
    let file = File::open(path).map_err(|e| SortError::ReadRun {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut r = BufReader::new(file);
    let mut out = Vec::new();
    loop {
        let mut len_buf = [0u8; 2];
        match r.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(SortError::ReadRun {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
        let len = u16::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf).map_err(|e| SortError::ReadRun {
            path: path.to_path_buf(),
            source: e,
        })?;
        out.push(buf);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_fixed_small_input_single_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let input: Vec<u32> = vec![5, 3, 1, 4, 2];
        let mut out = Vec::new();
        let n = sort_fixed(input, 1 << 20, dir.path(), |a, b| a.cmp(b), |_, _| true, |r| out.push(r)).unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn sort_fixed_spills_to_multiple_runs_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let input: Vec<u32> = (0..2000).rev().collect();
        // Force a tiny RAM budget so many runs are produced.
        let budget = std::mem::size_of::<u32>() * 50;
        let mut out = Vec::new();
        let n = sort_fixed(input, budget, dir.path(), |a, b| a.cmp(b), |_, _| true, |r| out.push(r)).unwrap();
        assert_eq!(n, 2000);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(out[0], 0);
        assert_eq!(out[1999], 1999);
    }

    #[test]
    fn keep_hook_dedups_consecutive_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let input: Vec<u32> = vec![1, 1, 2, 2, 2, 3];
        let mut last: Option<u32> = None;
        let mut out = Vec::new();
        sort_fixed(
            input,
            1 << 20,
            dir.path(),
            |a, b| a.cmp(b),
            |r, _| {
                let dup = last == Some(*r);
                last = Some(*r);
                !dup
            },
            |r| out.push(r),
        )
        .unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn sort_variable_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let input: Vec<Vec<u8>> = vec![b"charlie".to_vec(), b"alpha".to_vec(), b"bravo".to_vec()];
        let mut out = Vec::new();
        sort_variable(input, 1 << 20, dir.path(), |a, b| a.cmp(b), |_, _| true, |r| out.push(r)).unwrap();
        assert_eq!(out, vec![b"alpha".to_vec(), b"bravo".to_vec(), b"charlie".to_vec()]);
    }
}
