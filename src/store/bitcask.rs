//! A log-structured, bitcask-style `KVStore`, adapted from a single-writer/
//! lock-free-reader key-value engine: append-only log segments, an
//! in-memory index of log offsets, and background-free compaction
//! triggered inline once stale bytes cross a threshold.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use super::KVStore;
use crate::{Result, VolumeError};

/// Compaction threshold in bytes of stale (overwritten or removed) data.
const COMPACTION_THRESHOLD: u64 = 1024 * 1024;

#[derive(Serialize, Deserialize, Debug)]
enum Command {
    Set { key: String, value: Vec<u8> },
    Remove { key: String },
}

#[derive(Debug, Clone, Copy)]
struct CommandPos {
    gen: u64,
    pos: u64,
    len: u64,
}

/// An append-only log-structured key-value store with lock-free readers.
///
/// Writes are serialized via a `Mutex`; the in-memory index lives behind
/// an `RwLock` so readers never block each other. Each clone maintains
/// its own file handles to avoid contention between threads.
pub struct BitcaskStore {
    path: Arc<PathBuf>,
    index: Arc<RwLock<HashMap<String, CommandPos>>>,
    writer: Arc<Mutex<Writer>>,
    reader: Reader,
}

impl Clone for BitcaskStore {
    fn clone(&self) -> Self {
        BitcaskStore {
            path: self.path.clone(),
            index: self.index.clone(),
            writer: self.writer.clone(),
            reader: Reader {
                safe_point: self.reader.safe_point.clone(),
                path: self.path.clone(),
                readers: RefCell::new(HashMap::new()),
            },
        }
    }
}

struct Writer {
    current_gen: u64,
    writer: BufWriterWithPos<File>,
    readers: HashMap<u64, BufReaderWithPos<File>>,
    uncompacted: u64,
}

struct Reader {
    safe_point: Arc<AtomicU64>,
    path: Arc<PathBuf>,
    readers: RefCell<HashMap<u64, BufReaderWithPos<File>>>,
}

impl Reader {
    fn read_command(&self, cmd_pos: CommandPos) -> Result<Option<Vec<u8>>> {
        self.close_stale_readers();

        let mut readers = self.readers.borrow_mut();
        let reader = match readers.entry(cmd_pos.gen) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let r = BufReaderWithPos::new(File::open(log_path(&self.path, cmd_pos.gen))?)?;
                e.insert(r)
            }
        };
        reader.seek(SeekFrom::Start(cmd_pos.pos))?;
        let cmd_reader = reader.take(cmd_pos.len);
        if let Command::Set { value, .. } = serde_json::from_reader(cmd_reader)? {
            Ok(Some(value))
        } else {
            Err(VolumeError::UnexpectedCommandType)
        }
    }

    fn close_stale_readers(&self) {
        let safe_point = self.safe_point.load(Ordering::Acquire);
        if safe_point > 0 {
            let mut readers = self.readers.borrow_mut();
            readers.retain(|&gen, _| gen >= safe_point);
        }
    }
}

impl BitcaskStore {
    /// Opens a store rooted at `path`, creating the directory and
    /// replaying any existing log segments to rebuild the index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;

        let mut readers = HashMap::new();
        let mut index = HashMap::new();
        let mut uncompacted = 0u64;

        let gen_list = sorted_gen_list(&path)?;
        for &gen in &gen_list {
            let mut reader = BufReaderWithPos::new(File::open(log_path(&path, gen))?)?;
            uncompacted += load(gen, &mut reader, &mut index)?;
            readers.insert(gen, reader);
        }

        let current_gen = gen_list.last().unwrap_or(&0) + 1;
        let writer = new_log_file(&path, current_gen, &mut readers)?;

        let safe_point = Arc::new(AtomicU64::new(0));
        let path = Arc::new(path);

        let kv_writer = Writer {
            current_gen,
            writer,
            readers,
            uncompacted,
        };
        let reader = Reader {
            safe_point: safe_point.clone(),
            path: path.clone(),
            readers: RefCell::new(HashMap::new()),
        };

        Ok(Self {
            path,
            index: Arc::new(RwLock::new(index)),
            writer: Arc::new(Mutex::new(kv_writer)),
            reader,
        })
    }
}

fn compact(
    writer: &mut Writer,
    index: &RwLock<HashMap<String, CommandPos>>,
    safe_point: &AtomicU64,
    path: &Path,
) -> Result<()> {
    let compaction_gen = writer.current_gen + 1;
    writer.current_gen += 2;
    writer.writer = new_log_file(path, writer.current_gen, &mut writer.readers)?;

    let mut compaction_writer = new_log_file(path, compaction_gen, &mut writer.readers)?;

    let mut index = index.write().unwrap();
    let mut new_pos = 0u64;
    for cmd_pos in index.values_mut() {
        let reader = writer
            .readers
            .get_mut(&cmd_pos.gen)
            .ok_or(VolumeError::LogFileNotFound(cmd_pos.gen))?;
        reader.seek(SeekFrom::Start(cmd_pos.pos))?;

        let mut entry_reader = reader.take(cmd_pos.len);
        let len = io::copy(&mut entry_reader, &mut compaction_writer)?;
        *cmd_pos = CommandPos {
            gen: compaction_gen,
            pos: new_pos,
            len,
        };
        new_pos += len;
    }
    compaction_writer.flush()?;
    drop(index);

    let stale_gens: Vec<u64> = writer
        .readers
        .keys()
        .filter(|&&gen| gen < compaction_gen)
        .copied()
        .collect();
    for stale_gen in stale_gens {
        writer.readers.remove(&stale_gen);
        fs::remove_file(log_path(path, stale_gen))?;
    }
    writer.uncompacted = 0;
    safe_point.store(compaction_gen, Ordering::Release);

    Ok(())
}

impl KVStore for BitcaskStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let index = self.index.read().unwrap();
        if let Some(cmd_pos) = index.get(key).copied() {
            drop(index);
            self.reader.read_command(cmd_pos)
        } else {
            Ok(None)
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        let cmd = Command::Set {
            key: key.to_string(),
            value: value.to_vec(),
        };
        let pos = writer.writer.pos;
        serde_json::to_writer(&mut writer.writer, &cmd)?;
        writer.writer.flush()?;
        let new_pos = writer.writer.pos;
        let current_gen = writer.current_gen;

        let mut index = self.index.write().unwrap();
        if let Some(old_cmd) = index.insert(
            key.to_string(),
            CommandPos {
                gen: current_gen,
                pos,
                len: new_pos - pos,
            },
        ) {
            writer.uncompacted += old_cmd.len;
        }
        drop(index);

        if writer.uncompacted > COMPACTION_THRESHOLD {
            compact(&mut writer, &self.index, &self.reader.safe_point, &self.path)?;
        }

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();

        {
            let index = self.index.read().unwrap();
            if !index.contains_key(key) {
                return Ok(());
            }
        }

        let cmd = Command::Remove {
            key: key.to_string(),
        };
        serde_json::to_writer(&mut writer.writer, &cmd)?;
        writer.writer.flush()?;

        let mut index = self.index.write().unwrap();
        if let Some(old_cmd) = index.remove(key) {
            writer.uncompacted += old_cmd.len;
        }

        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let index = self.index.read().unwrap();
        Ok(index
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

fn sorted_gen_list(path: &Path) -> Result<Vec<u64>> {
    let mut gen_list: Vec<u64> = fs::read_dir(path)?
        .flat_map(|res| -> Result<_> { Ok(res?.path()) })
        .filter(|path| path.is_file() && path.extension() == Some("log".as_ref()))
        .filter_map(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .map(|s| s.trim_end_matches(".log"))
                .map(str::parse::<u64>)
        })
        .flatten()
        .collect();
    gen_list.sort_unstable();
    Ok(gen_list)
}

fn load(
    gen: u64,
    reader: &mut BufReaderWithPos<File>,
    index: &mut HashMap<String, CommandPos>,
) -> Result<u64> {
    let mut pos = reader.seek(SeekFrom::Start(0))?;
    let mut stream = Deserializer::from_reader(reader).into_iter::<Command>();
    let mut uncompacted = 0u64;

    while let Some(cmd) = stream.next() {
        let new_pos = stream.byte_offset() as u64;
        match cmd? {
            Command::Set { key, .. } => {
                if let Some(old_cmd) = index.insert(
                    key,
                    CommandPos {
                        gen,
                        pos,
                        len: new_pos - pos,
                    },
                ) {
                    uncompacted += old_cmd.len;
                }
            }
            Command::Remove { key } => {
                if let Some(old_cmd) = index.remove(&key) {
                    uncompacted += old_cmd.len;
                }
                uncompacted += new_pos - pos;
            }
        }
        pos = new_pos;
    }

    Ok(uncompacted)
}

fn new_log_file(
    path: &Path,
    gen: u64,
    readers: &mut HashMap<u64, BufReaderWithPos<File>>,
) -> Result<BufWriterWithPos<File>> {
    let path = log_path(path, gen);
    let writer = BufWriterWithPos::new(OpenOptions::new().create(true).append(true).open(&path)?)?;
    readers.insert(gen, BufReaderWithPos::new(File::open(&path)?)?);
    Ok(writer)
}

fn log_path(dir: &Path, gen: u64) -> PathBuf {
    dir.join(format!("{gen}.log"))
}

struct BufReaderWithPos<R: Read + Seek> {
    reader: BufReader<R>,
    pos: u64,
}

impl<R: Read + Seek> BufReaderWithPos<R> {
    fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self {
            reader: BufReader::new(inner),
            pos,
        })
    }
}

impl<R: Read + Seek> Read for BufReaderWithPos<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.reader.read(buf)?;
        self.pos += len as u64;
        Ok(len)
    }
}

impl<R: Read + Seek> Seek for BufReaderWithPos<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.reader.seek(pos)?;
        Ok(self.pos)
    }
}

struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    fn new(mut inner: W) -> Result<Self> {
        let pos = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            writer: BufWriter::new(inner),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> Seek for BufWriterWithPos<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.writer.seek(pos)?;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempdir().unwrap();
        let store = BitcaskStore::open(dir.path()).unwrap();
        store.put("meta::/a.txt", b"hello").unwrap();
        assert_eq!(store.get("meta::/a.txt").unwrap(), Some(b"hello".to_vec()));
        store.delete("meta::/a.txt").unwrap();
        assert_eq!(store.get("meta::/a.txt").unwrap(), None);
    }

    #[test]
    fn list_filters_by_prefix() {
        let dir = tempdir().unwrap();
        let store = BitcaskStore::open(dir.path()).unwrap();
        store.put("chunk::/a.txt::0", b"1").unwrap();
        store.put("chunk::/a.txt::1", b"2").unwrap();
        store.put("chunk::/b.txt::0", b"3").unwrap();
        let mut keys = store.list("chunk::/a.txt::").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["chunk::/a.txt::0", "chunk::/a.txt::1"]);
    }

    #[test]
    fn reopen_replays_log() {
        let dir = tempdir().unwrap();
        {
            let store = BitcaskStore::open(dir.path()).unwrap();
            store.put("k", b"v1").unwrap();
        }
        let store = BitcaskStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v1".to_vec()));
    }
}
