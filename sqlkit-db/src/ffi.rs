//! Raw FFI plumbing to `SQLite`.
//!
//! The symbols come from `libsqlite3-sys`, which compiles the bundled
//! amalgamation. This is the **only** file that contains `unsafe` code or C
//! types: everything above it talks to [`RawDb`] and [`RawStmt`], which check
//! each native result code and hand back plain Rust values.

#![allow(dead_code)]

use std::ffi::{c_char, c_int, CStr, CString};
use std::marker::PhantomData;
use std::ptr;
use std::sync::{Arc, Mutex, PoisonError};

use libsqlite3_sys as sys;

use super::error::{DbError, DbResult};

// ── SQLite constants ────────────────────────────────────────────────────

pub use sys::{
    SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_MEMORY, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_RANGE, SQLITE_TEXT,
};

// ── Error helpers ───────────────────────────────────────────────────────

/// Generic English description of a result code.
fn errstr(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a pointer to a static string or null.
    unsafe {
        let msg = sys::sqlite3_errstr(code);
        if msg.is_null() {
            format!("unknown error code {code}")
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

/// Builds an engine error for `code`, preferring the connection's message
/// when it describes the same failure.
fn error_from_handle(db: *mut sys::sqlite3, code: c_int) -> DbError {
    if db.is_null() {
        return DbError::engine(code, errstr(code));
    }
    // SAFETY: `db` is a live connection handle owned by a `RawDb`.
    let message = unsafe {
        if sys::sqlite3_errcode(db) & 0xff == code & 0xff {
            let msg = sys::sqlite3_errmsg(db);
            if msg.is_null() {
                None
            } else {
                Some(CStr::from_ptr(msg).to_string_lossy().into_owned())
            }
        } else {
            None
        }
    };
    DbError::engine(code, message.unwrap_or_else(|| errstr(code)))
}

fn too_big(what: &str) -> DbError {
    DbError::engine(sys::SQLITE_TOOBIG, format!("{what} exceeds the engine's length limit"))
}

// ── Connection handle ───────────────────────────────────────────────────

/// Connection pointer shared with [`RawInterrupt`]. Cleared under the lock
/// before the connection is closed.
struct SharedHandle(*mut sys::sqlite3);

// SAFETY: the pointer is only dereferenced by `sqlite3_interrupt`, which is
// documented as callable from any thread, and only while the lock is held
// and the handle is still open.
unsafe impl Send for SharedHandle {}

/// Owned `sqlite3*` handle.
pub struct RawDb {
    db: *mut sys::sqlite3,
    shared: Arc<Mutex<SharedHandle>>,
}

// SAFETY: the handle is opened in serialized or multi-thread mode and the
// safe wrapper is not `Sync`, so only one thread uses it at a time.
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens the database at `path` with `sqlite3_open_v2`.
    pub fn open(path: &str, flags: c_int) -> DbResult<Self> {
        let c_path = CString::new(path).map_err(|e| {
            DbError::engine(sys::SQLITE_CANTOPEN, format!("invalid path: {e}"))
        })?;

        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        // SAFETY: `c_path` is NUL-terminated and `db` is a valid out-pointer.
        let rc = unsafe { sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != sys::SQLITE_OK {
            // If open failed but we got a handle, extract the error and close.
            let err = error_from_handle(db, rc);
            if !db.is_null() {
                // SAFETY: the handle came from sqlite3_open_v2 and is unused.
                unsafe {
                    sys::sqlite3_close(db);
                }
            }
            return Err(err);
        }

        Ok(Self {
            db,
            shared: Arc::new(Mutex::new(SharedHandle(db))),
        })
    }

    /// Closes the handle. Calling it again after success is a no-op.
    pub fn close(&mut self) -> DbResult<()> {
        if self.db.is_null() {
            return Ok(());
        }
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .0 = ptr::null_mut();

        // SAFETY: `self.db` is open; statements borrow the connection so none
        // can be used after this point.
        let rc = unsafe { sys::sqlite3_close(self.db) };
        if rc != sys::SQLITE_OK {
            return Err(error_from_handle(self.db, rc));
        }
        self.db = ptr::null_mut();
        Ok(())
    }

    /// Compiles the first statement in `sql`.
    ///
    /// Returns the statement (`None` when `sql` holds only whitespace or
    /// comments) and the number of bytes of `sql` the engine consumed.
    pub fn prepare(&self, sql: &str) -> DbResult<(Option<RawStmt<'_>>, usize)> {
        if sql.as_bytes().contains(&0) {
            return Err(DbError::NulInSql);
        }
        let len = c_int::try_from(sql.len()).map_err(|_| too_big("SQL text"))?;
        let base = sql.as_ptr().cast::<c_char>();

        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        // SAFETY: `base` points at `len` readable bytes; both out-pointers
        // are valid for writes.
        let rc = unsafe { sys::sqlite3_prepare_v2(self.db, base, len, &mut stmt, &mut tail) };
        if rc != sys::SQLITE_OK {
            return Err(error_from_handle(self.db, rc));
        }

        let raw = (!stmt.is_null()).then_some(RawStmt {
            stmt,
            db: self.db,
            _db: PhantomData,
        });

        let consumed = if tail.is_null() {
            Some(sql.len())
        } else {
            // SAFETY: the engine reports the tail as a position inside the
            // buffer it was given (it maps back from its internal copy when
            // the input is not NUL-terminated).
            let offset = unsafe { tail.offset_from(base) };
            usize::try_from(offset).ok().filter(|n| *n <= sql.len())
        };
        match consumed {
            Some(consumed) => Ok((raw, consumed)),
            None => Err(DbError::engine(
                sys::SQLITE_MISUSE,
                "engine reported a statement tail outside the SQL text",
            )),
        }
    }

    /// `sqlite3_changes`.
    pub fn changes(&self) -> u64 {
        // SAFETY: `self.db` is open.
        let n = unsafe { sys::sqlite3_changes(self.db) };
        u64::try_from(n).unwrap_or(0)
    }

    /// `sqlite3_last_insert_rowid`.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: `self.db` is open.
        unsafe { sys::sqlite3_last_insert_rowid(self.db) }
    }

    /// `sqlite3_get_autocommit`.
    pub fn is_autocommit(&self) -> bool {
        // SAFETY: `self.db` is open.
        unsafe { sys::sqlite3_get_autocommit(self.db) != 0 }
    }

    /// `sqlite3_busy_timeout`.
    pub fn busy_timeout(&self, millis: c_int) -> DbResult<()> {
        // SAFETY: `self.db` is open.
        let rc = unsafe { sys::sqlite3_busy_timeout(self.db, millis) };
        if rc != sys::SQLITE_OK {
            return Err(error_from_handle(self.db, rc));
        }
        Ok(())
    }

    /// Returns a handle that can interrupt this connection from another
    /// thread.
    pub fn interrupt_handle(&self) -> RawInterrupt {
        RawInterrupt {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Thread-safe `sqlite3_interrupt` trampoline.
#[derive(Clone)]
pub struct RawInterrupt {
    shared: Arc<Mutex<SharedHandle>>,
}

impl RawInterrupt {
    /// Interrupts the connection, or does nothing if it has been closed.
    pub fn interrupt(&self) {
        let guard = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.0.is_null() {
            // SAFETY: the handle is still open while the lock is held.
            unsafe { sys::sqlite3_interrupt(guard.0) };
        }
    }
}

// ── Statement handle ────────────────────────────────────────────────────

/// Owned `sqlite3_stmt*` handle, tied to the connection that prepared it.
pub struct RawStmt<'db> {
    stmt: *mut sys::sqlite3_stmt,
    db: *mut sys::sqlite3,
    _db: PhantomData<&'db RawDb>,
}

impl RawStmt<'_> {
    fn check(&self, rc: c_int) -> DbResult<()> {
        if rc == sys::SQLITE_OK {
            Ok(())
        } else {
            Err(error_from_handle(self.db, rc))
        }
    }

    /// `sqlite3_step`; `true` when a row is available.
    pub fn step(&mut self) -> DbResult<bool> {
        // SAFETY: `self.stmt` is a live statement.
        match unsafe { sys::sqlite3_step(self.stmt) } {
            sys::SQLITE_ROW => Ok(true),
            sys::SQLITE_DONE => Ok(false),
            rc => Err(error_from_handle(self.db, rc)),
        }
    }

    /// `sqlite3_reset`. Bindings are kept.
    pub fn reset(&mut self) -> DbResult<()> {
        // SAFETY: `self.stmt` is a live statement.
        let rc = unsafe { sys::sqlite3_reset(self.stmt) };
        self.check(rc)
    }

    /// `sqlite3_clear_bindings`.
    pub fn clear_bindings(&mut self) -> DbResult<()> {
        // SAFETY: `self.stmt` is a live statement.
        let rc = unsafe { sys::sqlite3_clear_bindings(self.stmt) };
        self.check(rc)
    }

    /// `sqlite3_finalize`. Calling it again is a no-op.
    pub fn finalize(&mut self) -> DbResult<()> {
        if self.stmt.is_null() {
            return Ok(());
        }
        // SAFETY: `self.stmt` is live and is nulled right after, so it is
        // never finalized twice.
        let rc = unsafe { sys::sqlite3_finalize(self.stmt) };
        self.stmt = ptr::null_mut();
        self.check(rc)
    }

    // ── Parameter binding ───────────────────────────────────────────────

    /// `sqlite3_bind_null`.
    pub fn bind_null(&mut self, idx: c_int) -> DbResult<()> {
        // SAFETY: `self.stmt` is a live statement.
        let rc = unsafe { sys::sqlite3_bind_null(self.stmt, idx) };
        self.check(rc)
    }

    /// `sqlite3_bind_int64`.
    pub fn bind_int64(&mut self, idx: c_int, value: i64) -> DbResult<()> {
        // SAFETY: `self.stmt` is a live statement.
        let rc = unsafe { sys::sqlite3_bind_int64(self.stmt, idx, value) };
        self.check(rc)
    }

    /// `sqlite3_bind_double`.
    pub fn bind_double(&mut self, idx: c_int, value: f64) -> DbResult<()> {
        // SAFETY: `self.stmt` is a live statement.
        let rc = unsafe { sys::sqlite3_bind_double(self.stmt, idx, value) };
        self.check(rc)
    }

    /// `sqlite3_bind_text`; the engine copies the bytes.
    pub fn bind_text(&mut self, idx: c_int, value: &[u8]) -> DbResult<()> {
        let len = c_int::try_from(value.len()).map_err(|_| too_big("text parameter"))?;
        // SAFETY: `value` is valid for `len` bytes and SQLITE_TRANSIENT makes
        // the engine take its own copy before returning.
        let rc = unsafe {
            sys::sqlite3_bind_text(
                self.stmt,
                idx,
                value.as_ptr().cast::<c_char>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc)
    }

    /// `sqlite3_bind_blob`; the engine copies the bytes.
    pub fn bind_blob(&mut self, idx: c_int, value: &[u8]) -> DbResult<()> {
        let len = c_int::try_from(value.len()).map_err(|_| too_big("blob parameter"))?;
        // SAFETY: as for `bind_text`. An empty slice has a non-null dangling
        // pointer, which binds a zero-length blob rather than NULL.
        let rc = unsafe {
            sys::sqlite3_bind_blob(
                self.stmt,
                idx,
                value.as_ptr().cast(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc)
    }

    /// `sqlite3_bind_parameter_count`.
    pub fn parameter_count(&self) -> c_int {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_bind_parameter_count(self.stmt) }
    }

    /// `sqlite3_bind_parameter_index`; 0 when `name` is not a parameter.
    pub fn parameter_index(&self, name: &str) -> c_int {
        let Ok(c_name) = CString::new(name) else {
            return 0;
        };
        // SAFETY: `c_name` is NUL-terminated.
        unsafe { sys::sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) }
    }

    /// `sqlite3_bind_parameter_name`; `None` for anonymous `?` parameters.
    pub fn parameter_name(&self, idx: c_int) -> Option<&str> {
        // SAFETY: the returned string lives as long as the statement.
        unsafe { opt_str(sys::sqlite3_bind_parameter_name(self.stmt, idx)) }
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// `sqlite3_column_count`.
    pub fn column_count(&self) -> c_int {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_column_count(self.stmt) }
    }

    /// `sqlite3_column_name`.
    pub fn column_name(&self, idx: c_int) -> Option<&str> {
        // SAFETY: the name stays valid until the statement is finalized.
        unsafe { opt_str(sys::sqlite3_column_name(self.stmt, idx)) }
    }

    /// `sqlite3_column_type`.
    pub fn column_type(&self, idx: c_int) -> c_int {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_column_type(self.stmt, idx) }
    }

    /// `sqlite3_column_int64`.
    pub fn column_int64(&self, idx: c_int) -> i64 {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_column_int64(self.stmt, idx) }
    }

    /// `sqlite3_column_double`.
    pub fn column_double(&self, idx: c_int) -> f64 {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_column_double(self.stmt, idx) }
    }

    /// `sqlite3_column_text` bytes, without the NUL terminator.
    ///
    /// The slice borrows `self`: it stays valid until the next step, reset
    /// or finalize, all of which need `&mut self`.
    pub fn column_text(&self, idx: c_int) -> &[u8] {
        // SAFETY: text pointer first, then byte count, as the engine
        // documents; the buffer is engine-owned and stable while no
        // mutating call is made.
        unsafe {
            let ptr = sys::sqlite3_column_text(self.stmt, idx);
            let len = sys::sqlite3_column_bytes(self.stmt, idx);
            raw_slice(ptr.cast(), len)
        }
    }

    /// `sqlite3_column_blob` bytes. Same validity rules as
    /// [`column_text`](Self::column_text).
    pub fn column_blob(&self, idx: c_int) -> &[u8] {
        // SAFETY: see `column_text`.
        unsafe {
            let ptr = sys::sqlite3_column_blob(self.stmt, idx);
            let len = sys::sqlite3_column_bytes(self.stmt, idx);
            raw_slice(ptr.cast(), len)
        }
    }

    /// `sqlite3_stmt_readonly`.
    pub fn readonly(&self) -> bool {
        // SAFETY: `self.stmt` is a live statement.
        unsafe { sys::sqlite3_stmt_readonly(self.stmt) != 0 }
    }

    /// `sqlite3_sql`: the text the statement was prepared from.
    pub fn sql(&self) -> Option<&str> {
        // SAFETY: the text lives as long as the statement.
        unsafe { opt_str(sys::sqlite3_sql(self.stmt)) }
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

/// Borrows a NUL-terminated engine string as UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string that outlives `'a`.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

/// Builds a byte slice from an engine buffer, treating null as empty.
///
/// # Safety
///
/// `ptr` must be null or valid for `len` bytes for the lifetime `'a`.
unsafe fn raw_slice<'a>(ptr: *const u8, len: c_int) -> &'a [u8] {
    match usize::try_from(len) {
        Ok(len) if !ptr.is_null() && len > 0 => std::slice::from_raw_parts(ptr, len),
        _ => &[],
    }
}
