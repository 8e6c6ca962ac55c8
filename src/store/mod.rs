pub mod ledger;
pub mod session;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::app::Result;

pub use ledger::NotifiedLedger;
pub use session::{CacheMiss, SessionStore};

/// Write `contents` to `path` by way of a sibling temp file and a rename,
/// creating missing parent directories first.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
