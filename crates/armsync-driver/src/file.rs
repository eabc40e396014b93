//! 文件槽位介质
//!
//! 每个槽位对应目录下的一个 JSON 文件，便于与独立进程（仿真器、
//! 控制器桥接脚本）对接。文件没有推送通知，等待方退化为固定间隔轮询。
//!
//! 写入采用“临时文件 + rename”整体替换；对端若直接覆盖写，
//! 读方仍可能读到半写内容，由解码层按解析失败处理。

use crate::error::MediumError;
use crate::medium::{SlotKind, SlotMedium};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

/// 默认命令槽文件名
pub const DEFAULT_COMMAND_FILE: &str = "tcp_commands.json";

/// 默认确认槽文件名
pub const DEFAULT_ACK_FILE: &str = "tcp_ack.json";

/// 文件槽位介质
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
    command_path: PathBuf,
    ack_path: PathBuf,
}

impl FileMedium {
    /// 在 `dir` 下使用默认文件名打开介质（目录不存在时创建）
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MediumError> {
        Self::with_file_names(dir, DEFAULT_COMMAND_FILE, DEFAULT_ACK_FILE)
    }

    /// 指定两个槽位的文件名
    pub fn with_file_names(
        dir: impl AsRef<Path>,
        command_file: &str,
        ack_file: &str,
    ) -> Result<Self, MediumError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            command_path: dir.join(command_file),
            ack_path: dir.join(ack_file),
            dir,
        })
    }

    /// 槽位文件路径
    pub fn path(&self, slot: SlotKind) -> &Path {
        match slot {
            SlotKind::Command => &self.command_path,
            SlotKind::Ack => &self.ack_path,
        }
    }

    /// 介质所在目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn temp_path(&self, slot: SlotKind) -> PathBuf {
        let mut name = self
            .path(slot)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.dir.join(name)
    }
}

impl SlotMedium for FileMedium {
    fn write_slot(&self, slot: SlotKind, payload: &[u8]) -> Result<(), MediumError> {
        let tmp = self.temp_path(slot);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path(slot))?;
        trace!("Wrote {} bytes to {} slot file", payload.len(), slot);
        Ok(())
    }

    fn read_slot(&self, slot: SlotKind) -> Result<Option<Vec<u8>>, MediumError> {
        match fs::read(self.path(slot)) {
            // 空文件视为空槽位
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_slot(&self, slot: SlotKind) -> Result<(), MediumError> {
        match fs::remove_file(self.path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();
        assert_eq!(medium.read_slot(SlotKind::Command).unwrap(), None);
        assert_eq!(medium.read_slot(SlotKind::Ack).unwrap(), None);
        // 清空不存在的槽位不是错误
        medium.clear_slot(SlotKind::Ack).unwrap();
    }

    #[test]
    fn test_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();

        medium.write_slot(SlotKind::Command, b"{\"x\": 1.0, \"long\": true}").unwrap();
        medium.write_slot(SlotKind::Command, b"{}").unwrap();

        let on_disk = fs::read(dir.path().join(DEFAULT_COMMAND_FILE)).unwrap();
        assert_eq!(on_disk, b"{}");
        assert!(!medium.temp_path(SlotKind::Command).exists());
    }

    #[test]
    fn test_whitespace_only_file_is_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();
        fs::write(medium.path(SlotKind::Ack), b"  \n").unwrap();
        assert_eq!(medium.read_slot(SlotKind::Ack).unwrap(), None);
    }

    #[test]
    fn test_partial_external_write_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();
        // 对端直接覆盖写到一半
        fs::write(medium.path(SlotKind::Ack), b"{\"completed\": tr").unwrap();
        assert_eq!(
            medium.read_slot(SlotKind::Ack).unwrap(),
            Some(b"{\"completed\": tr".to_vec())
        );
    }

    #[test]
    fn test_custom_file_names_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::with_file_names(dir.path(), "cmd.json", "ack.json").unwrap();
        medium.write_slot(SlotKind::Ack, b"{}").unwrap();
        assert!(dir.path().join("ack.json").exists());

        medium.clear_slot(SlotKind::Ack).unwrap();
        assert!(!dir.path().join("ack.json").exists());
        assert!(medium.describe().starts_with("file:"));
    }
}
