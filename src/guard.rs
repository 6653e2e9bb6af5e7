//! Access guard: scoped, reentrant read/write locking around one backend.
//!
//! Two layers of exclusion:
//!
//! - In-process: a lock table keyed by thread. Any number of threads may read;
//!   one thread may write. A thread that already holds a token may nest
//!   further acquisitions without deadlocking.
//! - Cross-process: an advisory lock (`flock`/`LockFileEx` via `fs2`) on a
//!   sidecar `<statefile>.lock`. The sidecar is never replaced, so the atomic
//!   rename used by backend writes cannot invalidate a held lock.
//!
//! The OS lock is taken when the first token is granted and released when the
//! last token is dropped. It is shared while only readers hold tokens and
//! exclusive while a writer does.

use crate::backend::Backend;
use crate::document::{Document, StoredDocument};
use crate::error::{ApiError, StorageError};
use fs2::FileExt;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default interval between attempts on a contended OS lock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waiting behaviour for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Give up with `LockTimeout` after this long; `None` waits forever.
    pub timeout: Option<Duration>,
    /// How often a contended OS lock is retried.
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Access level an entity ended up with after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn label(self) -> &'static str {
        match self {
            LockMode::Shared => "read",
            LockMode::Exclusive => "write",
        }
    }
}

/// OS lock currently held by this guard.
///
/// `file` is `None` when the storage is read-only and no lock file could be
/// opened; readers then proceed without cross-process exclusion.
struct HeldLock {
    file: Option<File>,
    mode: LockMode,
}

#[derive(Default)]
struct LockTable {
    readers: HashMap<ThreadId, usize>,
    writer: Option<(ThreadId, usize)>,
    held: Option<HeldLock>,
    /// Reader waiting to turn its read into a write. Only one may wait.
    upgrading: Option<ThreadId>,
}

impl LockTable {
    fn holds_any(&self, me: ThreadId) -> bool {
        self.readers.contains_key(&me) || matches!(self.writer, Some((id, _)) if id == me)
    }

    fn other_readers(&self, me: ThreadId) -> bool {
        self.readers.keys().any(|id| *id != me)
    }
}

/// Scoped read/write lock over one entity's state file
pub struct AccessGuard {
    backend: Arc<dyn Backend>,
    lock_path: PathBuf,
    options: LockOptions,
    table: Mutex<LockTable>,
    released: Condvar,
}

impl AccessGuard {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_options(backend, LockOptions::default())
    }

    pub fn with_options(backend: Arc<dyn Backend>, options: LockOptions) -> Self {
        let lock_path = lock_path_for(backend.path());
        Self {
            backend,
            lock_path,
            options,
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
        }
    }

    /// State file guarded by this lock.
    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    /// Sidecar file carrying the cross-process lock.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn options(&self) -> LockOptions {
        self.options
    }

    /// Shared access using the guard's default timeout.
    pub fn acquire_read(&self) -> Result<ReadToken<'_>, ApiError> {
        self.acquire_read_timeout(self.options.timeout)
    }

    /// Exclusive access using the guard's default timeout.
    pub fn acquire_write(&self) -> Result<WriteToken<'_>, ApiError> {
        self.acquire_write_timeout(self.options.timeout)
    }

    /// Shared access, waiting at most `timeout`.
    pub fn acquire_read_timeout(&self, timeout: Option<Duration>) -> Result<ReadToken<'_>, ApiError> {
        self.acquire(LockMode::Shared, timeout)?;
        Ok(ReadToken {
            guard: self,
            _not_send: PhantomData,
        })
    }

    /// Exclusive access, waiting at most `timeout`.
    pub fn acquire_write_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<WriteToken<'_>, ApiError> {
        self.acquire(LockMode::Exclusive, timeout)?;
        Ok(WriteToken {
            guard: self,
            _not_send: PhantomData,
        })
    }

    /// Run `f` over a snapshot read under a shared token.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R, ApiError> {
        let token = self.acquire_read()?;
        let doc = token.document()?;
        Ok(f(&doc))
    }

    /// Read-modify-write under one exclusive token.
    ///
    /// The document is written back only if `f` changed it.
    pub fn modify<R>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let token = self.acquire_write()?;
        let original = token.document()?;
        let mut doc = original.clone();
        let result = f(&mut doc)?;
        if doc != original {
            token.commit(&doc)?;
        }
        Ok(result)
    }

    /// Make sure the state file exists and carries every required field.
    ///
    /// Missing fields are filled from `default`. When the storage refuses
    /// writes, falls back to a read-only check and reports `MissingState` if
    /// a required field is absent.
    pub fn initialize(&self, default: &Document) -> Result<Access, ApiError> {
        match self.initialize_writable(default) {
            Ok(()) => Ok(Access::ReadWrite),
            Err(ApiError::PermissionDenied(_)) => {
                debug!(path = %self.path().display(), "Storage not writable, falling back to read-only");
                let token = self.acquire_read()?;
                let stored = match token.load() {
                    Ok(stored) => stored,
                    Err(ApiError::Storage(StorageError::NotFound(_))) => StoredDocument::default(),
                    Err(e) => return Err(e),
                };
                if let Some(field) = stored.missing_field() {
                    return Err(ApiError::MissingState {
                        path: self.path().to_path_buf(),
                        field,
                    });
                }
                Ok(Access::ReadOnly)
            }
            Err(e) => Err(e),
        }
    }

    fn initialize_writable(&self, default: &Document) -> Result<(), ApiError> {
        let token = self.acquire_write()?;
        if !self.backend.exists() {
            token.commit(default)?;
            return Ok(());
        }
        let stored = token.load()?;
        if stored.missing_field().is_some() {
            let doc = Document {
                tags: stored.tags.unwrap_or_else(|| default.tags.clone()),
                categories: stored
                    .categories
                    .unwrap_or_else(|| default.categories.clone()),
            };
            token.commit(&doc)?;
        }
        Ok(())
    }

    fn acquire(&self, mode: LockMode, timeout: Option<Duration>) -> Result<(), ApiError> {
        let me = thread::current().id();
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut table = self.table.lock();

        let result = loop {
            match self.try_grant(&mut table, me, mode) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            let now = Instant::now();
            let wake = match deadline {
                Some(deadline) if now >= deadline => {
                    break Err(ApiError::LockTimeout {
                        path: self.path().to_path_buf(),
                        mode: mode.label(),
                        waited_ms: now.duration_since(started).as_millis(),
                    });
                }
                Some(deadline) => deadline.min(now + self.options.poll_interval),
                None => now + self.options.poll_interval,
            };
            self.released.wait_until(&mut table, wake);
        };

        if table.upgrading == Some(me) {
            table.upgrading = None;
        }
        result
    }

    /// Grant `mode` to `me` if the in-process table and the OS lock allow it.
    fn try_grant(&self, table: &mut LockTable, me: ThreadId, mode: LockMode) -> Result<bool, ApiError> {
        match mode {
            LockMode::Shared => {
                // Nested read inside any token this thread already holds
                if table.holds_any(me) {
                    *table.readers.entry(me).or_insert(0) += 1;
                    return Ok(true);
                }
                if table.writer.is_some() {
                    return Ok(false);
                }
                if table.held.is_none() {
                    match self.try_os_lock(None, LockMode::Shared)? {
                        Some(held) => table.held = Some(held),
                        None => return Ok(false),
                    }
                }
                table.readers.insert(me, 1);
                Ok(true)
            }
            LockMode::Exclusive => {
                if let Some((id, count)) = table.writer.as_mut() {
                    if *id == me {
                        *count += 1;
                        return Ok(true);
                    }
                    return Ok(false);
                }
                if table.other_readers(me) {
                    // Two readers each waiting for the other to let go would never wake
                    if table.readers.contains_key(&me) {
                        match table.upgrading {
                            Some(id) if id != me => {
                                return Err(ApiError::UpgradeConflict {
                                    path: self.path().to_path_buf(),
                                });
                            }
                            _ => table.upgrading = Some(me),
                        }
                    }
                    return Ok(false);
                }
                let needs_upgrade = !matches!(
                    table.held,
                    Some(HeldLock {
                        file: Some(_),
                        mode: LockMode::Exclusive
                    })
                );
                if needs_upgrade {
                    let current = table.held.take();
                    match self.try_os_lock(current, LockMode::Exclusive) {
                        Ok(Some(held)) => table.held = Some(held),
                        Ok(None) => {
                            // try_os_lock hands back nothing on contention; a
                            // thread upgrading from its own read keeps a shared lock
                            if table.readers.contains_key(&me) {
                                table.held = self.try_os_lock(None, LockMode::Shared)?;
                            }
                            return Ok(false);
                        }
                        Err(e) => {
                            if table.readers.contains_key(&me) {
                                table.held = self.try_os_lock(None, LockMode::Shared).ok().flatten();
                            }
                            return Err(e);
                        }
                    }
                }
                table.writer = Some((me, 1));
                Ok(true)
            }
        }
    }

    /// Try to take (or convert `current` to) an OS lock in `mode`.
    ///
    /// Returns `Ok(None)` when another process holds a conflicting lock.
    fn try_os_lock(
        &self,
        current: Option<HeldLock>,
        mode: LockMode,
    ) -> Result<Option<HeldLock>, ApiError> {
        let file = match current.and_then(|held| held.file) {
            Some(file) if mode == LockMode::Shared => file,
            Some(file) => {
                // A handle opened read-only cannot carry an exclusive lock on
                // every platform; reopen for writing.
                drop(file);
                match self.open_lock_file(mode)? {
                    Some(file) => file,
                    None => return Err(ApiError::PermissionDenied(self.path().to_path_buf())),
                }
            }
            None => match self.open_lock_file(mode)? {
                Some(file) => file,
                None => {
                    debug!(lock = %self.lock_path.display(), "No lock file available, reading without OS lock");
                    return Ok(Some(HeldLock { file: None, mode }));
                }
            },
        };

        let attempt = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };

        match attempt {
            Ok(()) => {
                debug!(lock = %self.lock_path.display(), mode = mode.label(), "Acquired state lock");
                Ok(Some(HeldLock {
                    file: Some(file),
                    mode,
                }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(StorageError::from_io(&self.lock_path, e).into()),
        }
    }

    /// Open the sidecar lock file.
    ///
    /// Exclusive mode needs a writable handle and maps a refusal to
    /// `PermissionDenied`. Shared mode settles for a read-only handle, or none
    /// at all when the sidecar cannot be created on read-only storage.
    fn open_lock_file(&self, mode: LockMode) -> Result<Option<File>, ApiError> {
        let writable = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path);

        match writable {
            Ok(file) => Ok(Some(file)),
            Err(e) if mode == LockMode::Exclusive => match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    Err(ApiError::PermissionDenied(self.path().to_path_buf()))
                }
                _ => Err(StorageError::from_io(&self.lock_path, e).into()),
            },
            Err(e) => match e.kind() {
                io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound => {
                    match OpenOptions::new().read(true).open(&self.lock_path) {
                        Ok(file) => Ok(Some(file)),
                        Err(_) => Ok(None),
                    }
                }
                _ => Err(StorageError::from_io(&self.lock_path, e).into()),
            },
        }
    }

    fn release(&self, mode: LockMode) {
        let me = thread::current().id();
        let mut table = self.table.lock();

        match mode {
            LockMode::Shared => {
                if let Some(count) = table.readers.get_mut(&me) {
                    *count -= 1;
                    if *count == 0 {
                        table.readers.remove(&me);
                    }
                }
            }
            LockMode::Exclusive => {
                if let Some((id, count)) = table.writer.as_mut() {
                    if *id == me {
                        *count -= 1;
                        if *count == 0 {
                            table.writer = None;
                        }
                    }
                }
            }
        }

        if table.writer.is_none() {
            if table.readers.is_empty() {
                if let Some(held) = table.held.take() {
                    if let Some(file) = held.file {
                        if let Err(e) = FileExt::unlock(&file) {
                            warn!(lock = %self.lock_path.display(), "Failed to release state lock: {}", e);
                        }
                    }
                    debug!(lock = %self.lock_path.display(), "Released state lock");
                }
            } else if let Some(held) = table.held.as_mut() {
                // Writer finished while this thread still reads: downgrade
                if held.mode == LockMode::Exclusive {
                    if let Some(file) = held.file.as_ref() {
                        if let Err(e) = FileExt::try_lock_shared(file) {
                            warn!(lock = %self.lock_path.display(), "Failed to downgrade state lock: {}", e);
                        }
                    }
                    held.mode = LockMode::Shared;
                }
            }
        }

        drop(table);
        self.released.notify_all();
    }
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("path", &self.path())
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Shared access token; released on drop
pub struct ReadToken<'a> {
    guard: &'a AccessGuard,
    _not_send: PhantomData<*const ()>,
}

impl ReadToken<'_> {
    /// Complete snapshot of the document.
    pub fn document(&self) -> Result<Document, ApiError> {
        Ok(self.guard.backend.read()?)
    }

    /// Document as stored, absent fields left as `None`.
    pub fn load(&self) -> Result<StoredDocument, ApiError> {
        Ok(self.guard.backend.load()?)
    }
}

impl Drop for ReadToken<'_> {
    fn drop(&mut self) {
        self.guard.release(LockMode::Shared);
    }
}

/// Exclusive access token; released on drop
pub struct WriteToken<'a> {
    guard: &'a AccessGuard,
    _not_send: PhantomData<*const ()>,
}

impl WriteToken<'_> {
    pub fn document(&self) -> Result<Document, ApiError> {
        Ok(self.guard.backend.read()?)
    }

    pub fn load(&self) -> Result<StoredDocument, ApiError> {
        Ok(self.guard.backend.load()?)
    }

    /// Replace the persisted document.
    pub fn commit(&self, doc: &Document) -> Result<(), ApiError> {
        Ok(self.guard.backend.write(doc)?)
    }
}

impl Drop for WriteToken<'_> {
    fn drop(&mut self) {
        self.guard.release(LockMode::Exclusive);
    }
}

/// Sidecar lock path for a state file: `Entity.<uuid>.json` → `Entity.<uuid>.json.lock`.
pub fn lock_path_for(state_path: &Path) -> PathBuf {
    let mut name = state_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    state_path.with_file_name(name)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
