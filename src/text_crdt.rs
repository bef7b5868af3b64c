//! Positional text CRDT: applies a client's `TextOp` sequence against a
//! document, rebasing each operation's `at` through a [`Bit`] that tracks
//! drift injected by later-accepted edits against the same session baseline.

use crate::bit::Bit;
use crate::common::TextOp;

/// Applies `ops` to `doc` in order, rebasing through `bit`. On success,
/// `bit` retains the accumulated drift so later patches against the same
/// session baseline see it. On failure, any `bit` updates made during this
/// call are rolled back and `doc` is left untouched; `false` is returned.
pub fn apply_ops(doc: &mut String, bit: &mut Bit, ops: &[TextOp]) -> bool {
    let mut applied_deltas: Vec<(usize, i64)> = Vec::with_capacity(ops.len());
    let mut chars: Vec<char> = doc.chars().collect();

    for op in ops {
        match op {
            TextOp::Insert { at, text } => {
                let off = bit.range_query(0, *at as i64) + *at as i64;
                if off < 0 || off as usize > chars.len() {
                    rollback(bit, &applied_deltas);
                    return false;
                }
                let insert_chars: Vec<char> = text.chars().collect();
                let delta = insert_chars.len() as i64;
                chars.splice(off as usize..off as usize, insert_chars);
                bit.update(*at, delta);
                applied_deltas.push((*at, delta));
            }
            TextOp::Delete { at, length } => {
                let off = bit.range_query(0, *at as i64) + *at as i64;
                if off < 0 {
                    rollback(bit, &applied_deltas);
                    return false;
                }
                let off = off as usize;
                let end = off.saturating_add(*length);
                if end > chars.len() {
                    rollback(bit, &applied_deltas);
                    return false;
                }
                chars.drain(off..end);
                let delta = -(*length as i64);
                bit.update(*at, delta);
                applied_deltas.push((*at, delta));
            }
        }
    }

    *doc = chars.into_iter().collect();
    true
}

fn rollback(bit: &mut Bit, applied_deltas: &[(usize, i64)]) {
    for (at, delta) in applied_deltas.iter().rev() {
        bit.update(*at, -*delta);
    }
}

/// A single-character edit produced by the LCS trace-back, anchored at its
/// position in the baseline (`old`) document — the same convention `at`
/// uses for a `TextOp`.
enum Raw {
    Insert(usize, char),
    Delete(usize),
}

/// An LCS-based diff producing a minimal sequence of `TextOp`s that turns
/// `old` into `new`, indexed by `char` position. Consecutive same-kind ops
/// at adjacent indices are coalesced into single runs so a whole-file
/// `TextFileSet` can be re-expressed as an efficient incremental edit.
pub fn diff(old: &str, new: &str) -> Vec<TextOp> {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    let (m, n) = (a.len(), b.len());

    // dp[i][j] = length of LCS of a[i..] and b[j..]
    let mut dp = vec![vec![0u32; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut raw = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < m && j < n {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            raw.push(Raw::Delete(i));
            i += 1;
        } else {
            raw.push(Raw::Insert(i, b[j]));
            j += 1;
        }
    }
    while i < m {
        raw.push(Raw::Delete(i));
        i += 1;
    }
    while j < n {
        raw.push(Raw::Insert(i, b[j]));
        j += 1;
    }

    coalesce(raw)
}

/// Merges consecutive same-kind `Raw` edits — deletes at adjacent baseline
/// indices, or inserts anchored at the same baseline index — into single
/// runs.
fn coalesce(raw: Vec<Raw>) -> Vec<TextOp> {
    let mut out = Vec::new();
    let mut idx = 0usize;
    while idx < raw.len() {
        match raw[idx] {
            Raw::Delete(start) => {
                let mut len = 1usize;
                let mut last = start;
                let mut k = idx + 1;
                while let Some(Raw::Delete(at)) = raw.get(k) {
                    if *at == last + 1 {
                        last = *at;
                        len += 1;
                        k += 1;
                    } else {
                        break;
                    }
                }
                out.push(TextOp::Delete { at: start, length: len });
                idx = k;
            }
            Raw::Insert(at, c) => {
                let mut text = String::new();
                text.push(c);
                let mut k = idx + 1;
                while let Some(Raw::Insert(nat, nc)) = raw.get(k) {
                    if *nat == at {
                        text.push(*nc);
                        k += 1;
                    } else {
                        break;
                    }
                }
                out.push(TextOp::Insert { at, text });
                idx = k;
            }
        }
    }
    out
}
