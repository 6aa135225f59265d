use std::{fs, path::PathBuf};

use anyhow::anyhow;
use tracing::debug;

use crate::COMMON_DIRS;

/// try current folder and rucond_config, resource, ../resource folder
///
/// 返回读到的内容 和 实际的路径
pub fn try_get_file_content(filename: &str) -> anyhow::Result<(String, PathBuf)> {
    let mut last_e: Option<std::io::Error> = None;
    for dir in &COMMON_DIRS {
        let p = PathBuf::from(String::from(*dir) + filename);

        match fs::read_to_string(&p) {
            Ok(r) => {
                debug!("read {} bytes from {:?}", r.len(), p);
                return Ok((r, p));
            }
            Err(e) => last_e = Some(e),
        }
    }

    match last_e {
        Some(e) => Err(anyhow::Error::new(e).context(format!("open {filename} failed"))),
        None => Err(anyhow!("open {filename} failed and no result err")),
    }
}
