//! IO helper: validated read and atomic write of JSON document text

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::IgnoredAny;

use crate::model::data_core::EditError;

/// 读取文件文本，并确认其为合法JSON
pub fn read_document_text(p: &Path) -> Result<String, EditError> {
    let f = File::open(p)?;
    let mut rdr = BufReader::new(f);
    let mut text = String::new();
    rdr.read_to_string(&mut text)?;
    serde_json::from_str::<IgnoredAny>(&text).map_err(EditError::InvalidDocument)?;
    Ok(text)
}

fn sibling_temp_path(p: &Path) -> PathBuf {
    let name = p
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    p.with_file_name(format!(".{}.tmp", name))
}

/// 先写同目录临时文件再重命名，目标文件要么是旧内容要么是新内容
pub fn write_document_text(p: &Path, text: &str) -> Result<(), EditError> {
    let tmp = sibling_temp_path(p);
    let result = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp)?;
        f.write_all(text.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, p)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    tracing::info!("文档已写入: {} ({} 字节)", p.display(), text.len());
    Ok(())
}
