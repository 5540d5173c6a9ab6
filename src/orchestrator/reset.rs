//! Reset a folder to pristine: remove the five meta files, re-expanding any
//! packed tar first (§3 "Reset", §8 scenario 6).

use std::path::Path;

use crate::errors::{Error, Result};
use crate::meta::META_FILES;
use crate::packer;

pub fn reset_folder(folder: &Path) -> Result<()> {
    packer::unpack(folder)?;
    for name in META_FILES {
        let path = folder.join(name);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
    }
    Ok(())
}
