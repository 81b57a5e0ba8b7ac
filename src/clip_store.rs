use crate::types::Transcript;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 行毎のクリップファイル名（`{transcriptId}_{speakerId}_{index}.mp3`）
///
/// 行の並べ替えや台本の編集で別の行と衝突しうるため、キャッシュの
/// 検索にのみ使う。マージには常に明示的なクリップ一覧を渡す。
pub fn clip_file_name(transcript_id: &str, speaker_id: &str, index: usize) -> String {
    format!("{}_{}_{}.mp3", transcript_id, speaker_id, index)
}

/// 台本の全行分のクリップファイル名
pub fn clip_file_names(transcript: &Transcript) -> Vec<String> {
    transcript
        .dialogue
        .iter()
        .enumerate()
        .map(|(i, line)| clip_file_name(&transcript.id, &line.speaker_id, i))
        .collect()
}

/// クリップの存在確認結果
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ClipStatus {
    pub file_name: String,
    pub exists: bool,
    pub path: PathBuf,
}

/// 生成済みクリップを置くディレクトリ
pub struct ClipStore {
    dir: PathBuf,
}

impl ClipStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// 指定ファイルの存在を確認
    pub fn check<S: AsRef<str>>(&self, file_names: &[S]) -> Vec<ClipStatus> {
        file_names
            .iter()
            .map(|name| {
                let path = self.path_of(name.as_ref());
                ClipStatus {
                    file_name: name.as_ref().to_string(),
                    exists: path.is_file(),
                    path,
                }
            })
            .collect()
    }

    /// 台本の全行分のクリップが揃っているか
    pub fn all_present(&self, transcript: &Transcript) -> bool {
        self.check(&clip_file_names(transcript))
            .iter()
            .all(|status| status.exists)
    }

    /// 台本の各行に対応するクリップのパス（台本の順）
    pub fn locations(&self, transcript: &Transcript) -> Vec<String> {
        clip_file_names(transcript)
            .iter()
            .map(|name| self.path_of(name).to_string_lossy().into_owned())
            .collect()
    }

    /// クリップを保存
    ///
    /// ディレクトリが存在しない場合は作成する。
    pub fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("クリップディレクトリの作成に失敗: {:?}", self.dir))?;
        }

        let path = self.path_of(file_name);
        fs::write(&path, bytes).with_context(|| format!("クリップの保存に失敗: {:?}", path))?;
        log::debug!("クリップ保存: {:?} ({} バイト)", path, bytes.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DialogueLine, Gender, Speaker};
    use tempfile::TempDir;

    fn transcript() -> Transcript {
        Transcript {
            id: "t1".to_string(),
            title: "Test".to_string(),
            speakers: vec![Speaker {
                id: "host".to_string(),
                name: "Alex".to_string(),
                voice: "echo".to_string(),
                gender: Gender::Male,
            }],
            dialogue: vec![
                DialogueLine {
                    speaker_id: "host".to_string(),
                    text: "Hello".to_string(),
                    id: "a".to_string(),
                },
                DialogueLine {
                    speaker_id: "guest".to_string(),
                    text: "Hi".to_string(),
                    id: "b".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_clip_file_names() {
        assert_eq!(clip_file_name("t1", "host", 3), "t1_host_3.mp3");
        assert_eq!(
            clip_file_names(&transcript()),
            vec!["t1_host_0.mp3", "t1_guest_1.mp3"]
        );
    }

    #[test]
    fn test_check_and_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = ClipStore::new(temp_dir.path().join("audio"));
        let transcript = transcript();

        assert!(!store.all_present(&transcript));

        store.save("t1_host_0.mp3", b"one").unwrap();
        let status = store.check(&clip_file_names(&transcript));
        assert!(status[0].exists);
        assert!(!status[1].exists);

        store.save("t1_guest_1.mp3", b"two").unwrap();
        assert!(store.all_present(&transcript));

        let locations = store.locations(&transcript);
        assert_eq!(fs::read(&locations[1]).unwrap(), b"two");
    }
}
