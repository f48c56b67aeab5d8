//! Native library checks.
//!
//! A check library is a shared object exporting two symbols:
//!
//! ```c
//! const char *get_api_version(void);
//! Check **get_check_list(void);   /* NULL-terminated */
//! ```
//!
//! Every string field of the exported structs is a fixed 500-byte,
//! NUL-terminated buffer. Fields are decoded once when the library is
//! loaded; afterwards only the `run` function pointer is used.

use std::ffi::{c_char, c_int, CStr, CString};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Check, CheckKind, Metadata, MetadataDocument, Summary};
use crate::error::{DiagError, LoadErrorKind, Result};

/// Size of every fixed string field.
pub const MAX_STRING_LENGTH: usize = 500;

/// Symbol returning the library's API version.
pub const API_VERSION_SYMBOL: &str = "get_api_version";
/// Symbol returning the NULL-terminated check table.
pub const CHECK_LIST_SYMBOL: &str = "get_check_list";

/// File extensions treated as shared libraries.
pub const LIBRARY_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];

type FixedString = [c_char; MAX_STRING_LENGTH];

#[repr(C)]
pub struct RawCheckMetadata {
    pub name: FixedString,
    pub kind: FixedString,
    pub tags: FixedString,
    pub descr: FixedString,
    pub data_req: FixedString,
    pub rights: FixedString,
    pub timeout: c_int,
    pub version: FixedString,
}

#[repr(C)]
pub struct RawCheckResult {
    pub result: *mut c_char,
}

/// Entry point exported per check. Receives the JSON-encoded inputs.
pub type RawRunFn = unsafe extern "C" fn(*mut c_char) -> RawCheckResult;

#[repr(C)]
pub struct RawCheck {
    pub metadata: RawCheckMetadata,
    pub run: Option<RawRunFn>,
    pub api_version: FixedString,
}

type ApiVersionFn = unsafe extern "C" fn() -> *const c_char;
type CheckListFn = unsafe extern "C" fn() -> *const *const RawCheck;

/// Decode a fixed, NUL-terminated buffer.
pub fn decode_fixed(buffer: &[c_char]) -> std::result::Result<String, String> {
    let bytes: Vec<u8> = buffer
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    if bytes.len() == buffer.len() {
        return Err("string field is not NUL-terminated".to_string());
    }
    String::from_utf8(bytes).map_err(|e| format!("string field is not UTF-8: {}", e))
}

impl RawCheckMetadata {
    /// Decode into the metadata document shared by all plugin kinds.
    pub fn decode(&self) -> std::result::Result<MetadataDocument, String> {
        Ok(MetadataDocument {
            name: decode_fixed(&self.name)?,
            kind: decode_fixed(&self.kind)?,
            tags: decode_fixed(&self.tags)?,
            descr: decode_fixed(&self.descr)?,
            data_req: decode_fixed(&self.data_req)?,
            rights: decode_fixed(&self.rights)?,
            timeout: i64::from(self.timeout),
            version: decode_fixed(&self.version)?,
            run: String::new(),
        })
    }
}

/// An open shared object. Closed when the last check using it is dropped.
pub struct SharedLibrary {
    #[cfg(unix)]
    handle: *mut libc::c_void,
    path: std::path::PathBuf,
}

// SAFETY: the handle is only used for dlsym/dlclose, which are thread-safe
unsafe impl Send for SharedLibrary {}
unsafe impl Sync for SharedLibrary {}

impl SharedLibrary {
    /// Open `path` with the platform dynamic loader.
    #[cfg(unix)]
    pub fn open(path: &Path) -> Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            DiagError::load(path, LoadErrorKind::Library("path contains NUL".to_string()))
        })?;
        // SAFETY: c_path is a valid NUL-terminated string
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(DiagError::load(path, LoadErrorKind::Library(dl_error())));
        }
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    pub fn open(path: &Path) -> Result<Self> {
        Err(DiagError::load(
            path,
            LoadErrorKind::Library("native check libraries are not supported on this platform".to_string()),
        ))
    }

    #[cfg(unix)]
    fn symbol(&self, name: &str) -> Result<*mut libc::c_void> {
        let c_name = CString::new(name).map_err(|_| {
            DiagError::load(&self.path, LoadErrorKind::Library(format!("bad symbol {}", name)))
        })?;
        // SAFETY: handle came from a successful dlopen and c_name is NUL-terminated
        let symbol = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };
        if symbol.is_null() {
            return Err(DiagError::load(
                &self.path,
                LoadErrorKind::Library(format!("missing symbol '{}'", name)),
            ));
        }
        Ok(symbol)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            // SAFETY: handle came from a successful dlopen and is closed once
            unsafe {
                libc::dlclose(self.handle);
            }
        }
    }
}

impl fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(unix)]
fn dl_error() -> String {
    // SAFETY: dlerror returns NULL or a NUL-terminated string owned by libc
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        "dlopen failed".to_string()
    } else {
        // SAFETY: checked non-null above
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}

/// A check exported by a native library.
pub struct LibraryCheck {
    library: Option<Arc<SharedLibrary>>,
    run: RawRunFn,
}

impl LibraryCheck {
    /// Run the exported function with JSON-encoded `inputs`.
    pub fn run(&self, check: &str, inputs: &Map<String, Value>) -> Result<Summary> {
        let payload = CString::new(Value::Object(inputs.clone()).to_string()).map_err(|e| {
            DiagError::Execution {
                check: check.to_string(),
                message: format!("inputs cannot be passed to the library: {}", e),
            }
        })?;
        let raw = payload.into_raw();
        // SAFETY: raw points to a NUL-terminated buffer that stays alive for the call
        let result = unsafe { (self.run)(raw) };
        // SAFETY: raw came from CString::into_raw above and is reclaimed once
        drop(unsafe { CString::from_raw(raw) });

        if result.result.is_null() {
            return Err(DiagError::Execution {
                check: check.to_string(),
                message: "library returned no result".to_string(),
            });
        }
        // SAFETY: checked non-null; the library owns the buffer
        let text = unsafe { CStr::from_ptr(result.result) }
            .to_str()
            .map_err(|e| DiagError::Execution {
                check: check.to_string(),
                message: format!("result is not UTF-8: {}", e),
            })?;
        Summary::from_json(text)
    }

    /// Path of the library this check lives in, if any.
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_deref().map(SharedLibrary::path)
    }
}

impl fmt::Debug for LibraryCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryCheck")
            .field("library", &self.library_path())
            .finish_non_exhaustive()
    }
}

/// Build a check from one exported table entry.
///
/// The entry's own API version field, when set, must match the library's.
pub fn check_from_raw(
    raw: &RawCheck,
    library: Option<Arc<SharedLibrary>>,
    api_version: &str,
) -> Result<Check> {
    let source = library
        .as_deref()
        .map(|l| l.path().to_path_buf())
        .unwrap_or_default();
    let malformed = |message: String| DiagError::load(&source, LoadErrorKind::MalformedMetadata(message));

    let doc = raw.metadata.decode().map_err(malformed)?;
    let declared = decode_fixed(&raw.api_version).map_err(malformed)?;
    if !declared.is_empty() && declared != api_version {
        return Err(DiagError::load(
            &source,
            LoadErrorKind::ApiVersionMismatch {
                expected: api_version.to_string(),
                found: declared,
            },
        ));
    }
    let Some(run) = raw.run else {
        return Err(malformed(format!("check '{}' has no run function", doc.name)));
    };

    let metadata = Metadata::from_document(doc, api_version)?;
    Ok(Check::new(metadata, CheckKind::Library(LibraryCheck { library, run })))
}

/// Load every check exported by the library at `path`.
///
/// A missing symbol, an API mismatch or any bad table entry fails the whole
/// library.
#[cfg(unix)]
pub fn load_library(path: &Path, expected_api: &str) -> Result<Vec<Check>> {
    let library = Arc::new(SharedLibrary::open(path)?);

    // SAFETY: the symbol is declared with this signature by the plugin ABI
    let get_api_version: ApiVersionFn =
        unsafe { std::mem::transmute::<*mut libc::c_void, ApiVersionFn>(library.symbol(API_VERSION_SYMBOL)?) };
    // SAFETY: as above
    let get_check_list: CheckListFn =
        unsafe { std::mem::transmute::<*mut libc::c_void, CheckListFn>(library.symbol(CHECK_LIST_SYMBOL)?) };

    // SAFETY: calling into the plugin; the returned string is owned by it
    let version_ptr = unsafe { get_api_version() };
    if version_ptr.is_null() {
        return Err(DiagError::load(
            path,
            LoadErrorKind::MalformedMetadata("get_api_version returned NULL".to_string()),
        ));
    }
    // SAFETY: checked non-null
    let found = unsafe { CStr::from_ptr(version_ptr) }
        .to_string_lossy()
        .trim()
        .to_string();
    if found != expected_api {
        return Err(DiagError::load(
            path,
            LoadErrorKind::ApiVersionMismatch {
                expected: expected_api.to_string(),
                found,
            },
        ));
    }

    // SAFETY: the table is NULL-terminated and owned by the library
    let table = unsafe { get_check_list() };
    // SAFETY: table and its entries stay valid while the library is open
    unsafe { checks_from_table(table, Some(library), &found) }
}

#[cfg(not(unix))]
pub fn load_library(path: &Path, _expected_api: &str) -> Result<Vec<Check>> {
    SharedLibrary::open(path).map(|_| Vec::new())
}

/// Build checks from a NULL-terminated table of entries.
///
/// # Safety
///
/// `table` must be NULL or point to a NULL-terminated array of valid
/// `RawCheck` pointers that outlive the returned checks.
pub unsafe fn checks_from_table(
    table: *const *const RawCheck,
    library: Option<Arc<SharedLibrary>>,
    api_version: &str,
) -> Result<Vec<Check>> {
    let mut checks = Vec::new();
    if table.is_null() {
        return Ok(checks);
    }
    let mut index = 0;
    loop {
        let entry = *table.add(index);
        if entry.is_null() {
            break;
        }
        checks.push(check_from_raw(&*entry, library.clone(), api_version)?);
        index += 1;
    }
    Ok(checks)
}
