//! Asset upload encoding.
//!
//! Files are sent to the backend as base64 inside a JSON body. Every limit is
//! checked here, before a byte goes over the network.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use thiserror::Error;

/// Maximum number of files in one upload.
pub const MAX_FILES_PER_BATCH: usize = 5;

/// Maximum size of a single file (2 MiB).
pub const MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

/// Which asset list an upload is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Images,
    Videos,
    Certificates,
}

impl AssetKind {
    /// Path segment used by the backend upload endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Certificates => "certificates",
        }
    }

    /// Whether a MIME type is acceptable for this kind.
    #[must_use]
    pub fn accepts(self, content_type: &str) -> bool {
        match self {
            Self::Images => content_type.starts_with("image/"),
            Self::Videos => content_type.starts_with("video/"),
            Self::Certificates => {
                content_type == "application/pdf" || content_type.starts_with("image/")
            }
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "images" => Ok(Self::Images),
            "videos" => Ok(Self::Videos),
            "certificates" => Ok(Self::Certificates),
            other => Err(UploadError::UnknownKind(other.to_string())),
        }
    }
}

/// Reasons an upload is refused locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Choose at least one file to upload")]
    NoFiles,

    #[error("You can upload at most {max} files at once ({count} selected)")]
    TooManyFiles { count: usize, max: usize },

    #[error("{file_name} is {size} bytes; the limit is 2 MB per file")]
    FileTooLarge { file_name: String, size: usize },

    #[error("{0} is empty")]
    EmptyFile(String),

    #[error("{file_name} ({content_type}) cannot be uploaded as {kind}")]
    UnsupportedType {
        file_name: String,
        content_type: String,
        kind: AssetKind,
    },

    #[error("Unknown asset type: {0}")]
    UnknownKind(String),
}

/// A file received from the admin upload form.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One encoded file in the upload body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetail {
    /// `data:<mime>;base64,<payload>`
    pub base64: String,
    pub size: usize,
    pub file_name: String,
    pub file_type: String,
}

/// Upload request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatch {
    pub file_details: Vec<FileDetail>,
}

impl UploadBatch {
    /// Check limits and encode files.
    ///
    /// # Errors
    ///
    /// Returns the first [`UploadError`] found; nothing is encoded in that case.
    pub fn encode(kind: AssetKind, files: Vec<UploadFile>) -> Result<Self, UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        if files.len() > MAX_FILES_PER_BATCH {
            return Err(UploadError::TooManyFiles {
                count: files.len(),
                max: MAX_FILES_PER_BATCH,
            });
        }
        for file in &files {
            if file.bytes.is_empty() {
                return Err(UploadError::EmptyFile(file.file_name.clone()));
            }
            if file.bytes.len() > MAX_FILE_BYTES {
                return Err(UploadError::FileTooLarge {
                    file_name: file.file_name.clone(),
                    size: file.bytes.len(),
                });
            }
            if !kind.accepts(&file.content_type) {
                return Err(UploadError::UnsupportedType {
                    file_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                    kind,
                });
            }
        }

        let file_details = files
            .into_iter()
            .map(|file| FileDetail {
                base64: format!(
                    "data:{};base64,{}",
                    file.content_type,
                    STANDARD.encode(&file.bytes)
                ),
                size: file.bytes.len(),
                file_name: file.file_name,
                file_type: file.content_type,
            })
            .collect();

        Ok(Self { file_details })
    }

    /// Number of files in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.file_details.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_details.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png(name: &str, size: usize) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![7; size],
        }
    }

    #[test]
    fn test_file_over_two_mib_is_rejected() {
        let err = UploadBatch::encode(
            AssetKind::Images,
            vec![png("ok.png", 10), png("huge.png", MAX_FILE_BYTES + 1)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            UploadError::FileTooLarge {
                file_name: "huge.png".to_string(),
                size: MAX_FILE_BYTES + 1
            }
        );
    }

    #[test]
    fn test_exactly_two_mib_is_accepted() {
        let batch = UploadBatch::encode(AssetKind::Images, vec![png("edge.png", MAX_FILE_BYTES)])
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.file_details[0].size, MAX_FILE_BYTES);
    }

    #[test]
    fn test_more_than_five_files_rejected() {
        let files = (0..6).map(|i| png(&format!("{i}.png"), 1)).collect();
        assert_eq!(
            UploadBatch::encode(AssetKind::Images, files).unwrap_err(),
            UploadError::TooManyFiles { count: 6, max: 5 }
        );
    }

    #[test]
    fn test_empty_and_mistyped_files_rejected() {
        assert_eq!(
            UploadBatch::encode(AssetKind::Images, vec![]).unwrap_err(),
            UploadError::NoFiles
        );
        assert!(matches!(
            UploadBatch::encode(AssetKind::Images, vec![png("blank.png", 0)]),
            Err(UploadError::EmptyFile(_))
        ));
        assert!(matches!(
            UploadBatch::encode(AssetKind::Videos, vec![png("still.png", 4)]),
            Err(UploadError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_body_shape() {
        let batch = UploadBatch::encode(
            AssetKind::Certificates,
            vec![UploadFile {
                file_name: "grs.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF".to_vec(),
            }],
        )
        .unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        let detail = &json["fileDetails"][0];
        assert_eq!(detail["fileName"], "grs.pdf");
        assert_eq!(detail["fileType"], "application/pdf");
        assert_eq!(detail["size"], 4);
        assert_eq!(detail["base64"], "data:application/pdf;base64,JVBERg==");
    }

    #[test]
    fn test_kind_path_segments() {
        for kind in [AssetKind::Images, AssetKind::Videos, AssetKind::Certificates] {
            assert_eq!(kind.as_str().parse::<AssetKind>().unwrap(), kind);
        }
        assert!("thumbnails".parse::<AssetKind>().is_err());
    }
}
