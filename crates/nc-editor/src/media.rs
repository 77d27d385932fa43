//! File import and audio/video recording.
//!
//! Both are one-shot host round trips: an image must be decoded before
//! its natural size is known, and recording needs a permission grant.
//! Pending work is tied to the page it started on and is dropped when the
//! active page changes.

use crate::config::{EditorConfig, Size};
use nc_core::geometry::{Bounds, Point};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, ItemKind, MediaData};
use nc_core::store::PageKey;
use serde::{Deserialize, Serialize};

/// A file read by the host, already encoded as a data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedFile {
    pub name: String,
    pub mime_type: String,
    pub data_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Audio,
    Video,
    File,
}

impl MediaCategory {
    pub fn from_mime(mime: &str) -> Self {
        let top = mime.split('/').next().unwrap_or_default().trim();
        match top.to_ascii_lowercase().as_str() {
            "image" => MediaCategory::Image,
            "audio" => MediaCategory::Audio,
            "video" => MediaCategory::Video,
            _ => MediaCategory::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingKind {
    Audio,
    Video,
}

/// Host media primitives.
pub trait MediaDevices {
    /// Ask for microphone (and camera, for video) access.
    fn request_access(&mut self, kind: RecordingKind) -> Result<(), String>;
}

/// Transient user-visible notification, drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    #[serde(rename_all = "camelCase")]
    PermissionDenied { kind: RecordingKind, reason: String },
    #[serde(rename_all = "camelCase")]
    ImportFailed { file_name: String, reason: String },
    /// Pending uploads or a recording were dropped by a page change.
    #[serde(rename_all = "camelCase")]
    Abandoned { count: usize },
}

/// Handle for an image waiting on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadToken(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Item ready to add.
    Placed(CanvasItem),
    /// Call `image_decoded` with this token once the size is known.
    AwaitingDecode(UploadToken),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Placed(CanvasItem),
    Failed(Notice),
    /// The upload was abandoned; nothing to do.
    Stale,
}

#[derive(Debug, Clone)]
struct PendingImage {
    token: UploadToken,
    page: PageKey,
    at: Point,
    file: ImportedFile,
}

#[derive(Debug, Clone)]
struct Recording {
    kind: RecordingKind,
    page: PageKey,
    at: Point,
}

#[derive(Debug, Clone, Default)]
pub struct MediaController {
    pending: Vec<PendingImage>,
    recording: Option<Recording>,
    next_token: u64,
}

fn media_item(prefix: &str, at: Point, size: Size, kind: ItemKind) -> CanvasItem {
    CanvasItem::new(
        ItemId::generate(prefix),
        Bounds::new(at.x, at.y, size.width, size.height),
        kind,
    )
}

impl MediaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a dropped/uploaded file at canvas point `at`.
    pub fn import(&mut self, file: ImportedFile, at: Point, page: &PageKey, cfg: &EditorConfig) -> ImportOutcome {
        let sizes = &cfg.default_sizes;
        let data = MediaData {
            url: file.data_url.clone(),
            file_name: file.name.clone(),
            mime_type: Some(file.mime_type.clone()),
        };
        let item = match MediaCategory::from_mime(&file.mime_type) {
            MediaCategory::Image => {
                let token = UploadToken(self.next_token);
                self.next_token += 1;
                log::debug!("awaiting decode of {} ({token:?})", file.name);
                self.pending.push(PendingImage {
                    token,
                    page: page.clone(),
                    at,
                    file,
                });
                return ImportOutcome::AwaitingDecode(token);
            }
            MediaCategory::Audio => media_item("audio", at, sizes.audio, ItemKind::Audio(data)),
            MediaCategory::Video => media_item("video", at, sizes.video, ItemKind::Video(data)),
            MediaCategory::File => media_item("file", at, sizes.file, ItemKind::File(data)),
        };
        ImportOutcome::Placed(item)
    }

    /// The host finished decoding an image. It is placed at its natural
    /// size, scaled down to `max_image_width` with the aspect kept.
    pub fn image_decoded(
        &mut self,
        token: UploadToken,
        natural_width: f64,
        natural_height: f64,
        cfg: &EditorConfig,
    ) -> DecodeOutcome {
        let Some(idx) = self.pending.iter().position(|p| p.token == token) else {
            return DecodeOutcome::Stale;
        };
        let pending = self.pending.remove(idx);
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(natural_width) || !valid(natural_height) {
            return DecodeOutcome::Failed(Notice::ImportFailed {
                file_name: pending.file.name,
                reason: "image has no usable size".to_string(),
            });
        }
        let scale = if natural_width > cfg.max_image_width {
            cfg.max_image_width / natural_width
        } else {
            1.0
        };
        let size = Size::new(natural_width * scale, natural_height * scale);
        let data = MediaData {
            url: pending.file.data_url,
            file_name: pending.file.name,
            mime_type: Some(pending.file.mime_type),
        };
        DecodeOutcome::Placed(media_item("image", pending.at, size, ItemKind::Image(data)))
    }

    /// The host could not read or decode an upload.
    pub fn upload_failed(&mut self, token: UploadToken, reason: &str) -> Option<Notice> {
        let idx = self.pending.iter().position(|p| p.token == token)?;
        let pending = self.pending.remove(idx);
        Some(Notice::ImportFailed {
            file_name: pending.file.name,
            reason: reason.to_string(),
        })
    }

    pub fn pending_page(&self, token: UploadToken) -> Option<&PageKey> {
        self.pending.iter().find(|p| p.token == token).map(|p| &p.page)
    }

    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }

    /// Begin recording. On denial nothing starts and a notice is returned.
    pub fn start_recording(
        &mut self,
        devices: &mut dyn MediaDevices,
        kind: RecordingKind,
        page: &PageKey,
        at: Point,
    ) -> Result<(), Notice> {
        if self.recording.is_some() {
            log::warn!("recording already in progress");
            return Ok(());
        }
        devices.request_access(kind).map_err(|reason| {
            log::warn!("{kind:?} permission denied: {reason}");
            Notice::PermissionDenied { kind, reason }
        })?;
        self.recording = Some(Recording {
            kind,
            page: page.clone(),
            at,
        });
        Ok(())
    }

    /// Finish recording with the encoded clip. Returns the item to add and
    /// the page it belongs to.
    pub fn stop_recording(&mut self, data_url: &str, cfg: &EditorConfig) -> Option<(PageKey, CanvasItem)> {
        let rec = self.recording.take()?;
        let (prefix, ext, size) = match rec.kind {
            RecordingKind::Audio => ("audio", "audio/webm", cfg.default_sizes.audio),
            RecordingKind::Video => ("video", "video/webm", cfg.default_sizes.video),
        };
        let data = MediaData {
            url: data_url.to_string(),
            file_name: format!("{prefix}-recording.webm"),
            mime_type: Some(ext.to_string()),
        };
        let kind = match rec.kind {
            RecordingKind::Audio => ItemKind::Audio(data),
            RecordingKind::Video => ItemKind::Video(data),
        };
        Some((rec.page, media_item(prefix, rec.at, size, kind)))
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Drop every pending upload and any recording. Returns how many
    /// operations were abandoned.
    pub fn abandon_all(&mut self) -> usize {
        let count = self.pending.len() + usize::from(self.recording.is_some());
        if count > 0 {
            log::debug!("abandoning {count} pending media operation(s)");
        }
        self.pending.clear();
        self.recording = None;
        count
    }
}
