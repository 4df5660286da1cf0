use gallery_core::{GalleryClient, GalleryError};

use crate::runner::run_with_limit;
use crate::transcode::{TranscodedImage, Transcoder};

pub const WEBP_CONTENT_TYPE: &str = "image/webp";
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

/// One selected file, already read into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Per-batch outcome counts, reported once at the end of a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failed == 0
    }
}

/// Progress hooks for the batch; the UI layer maps these onto toasts and
/// progress bars.
#[derive(Debug)]
pub enum UploadEvent {
    Skipped { name: String },
    Converting { position: usize, total: usize },
    ConversionFailed { name: String },
    Uploaded { name: String, completed: usize, total: usize },
    UploadFailed { name: String, error: GalleryError },
}

/// Upload names must be all-digits before the first dot; anything else
/// is skipped up front rather than sent.
pub fn valid_basename(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or("");
    !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit())
}

/// Validates, transcodes, and uploads one batch of files. Conversion
/// runs one file at a time (each bounded by the transcoder's timeouts);
/// the converted artifacts then fan out to the upload endpoint with at
/// most `concurrency` requests in flight. Every per-item failure is
/// absorbed into the summary; the batch always runs to completion.
pub async fn upload_batch<F>(
    client: &GalleryClient,
    transcoder: &Transcoder,
    files: Vec<SourceFile>,
    concurrency: usize,
    mut notify: F,
) -> UploadSummary
where
    F: FnMut(UploadEvent),
{
    let mut summary = UploadSummary::default();
    let mut converted: Vec<TranscodedImage> = Vec::new();

    // Invalid names are reported up front; conversion progress runs
    // over the valid files only.
    let (valid, invalid): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|file| valid_basename(&file.name));
    for file in invalid {
        summary.skipped += 1;
        notify(UploadEvent::Skipped { name: file.name });
    }

    let total = valid.len();
    for (position, file) in valid.into_iter().enumerate() {
        notify(UploadEvent::Converting { position, total });
        match transcoder.transcode(&file.name, file.bytes).await {
            Some(artifact) => converted.push(artifact),
            None => {
                summary.failed += 1;
                notify(UploadEvent::ConversionFailed { name: file.name });
            }
        }
    }

    let names: Vec<String> = converted.iter().map(|a| a.name.clone()).collect();
    let uploads = names.len();
    let results = run_with_limit(converted, concurrency, |_, artifact: TranscodedImage| {
        let TranscodedImage { name, bytes } = artifact;
        async move { client.upload(&name, bytes, WEBP_CONTENT_TYPE).await }
    })
    .await;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(()) => {
                summary.sent += 1;
                notify(UploadEvent::Uploaded {
                    name: names[index].clone(),
                    completed: summary.sent,
                    total: uploads,
                });
            }
            Err(error) => {
                summary.failed += 1;
                notify(UploadEvent::UploadFailed {
                    name: names[index].clone(),
                    error,
                });
            }
        }
    }

    summary
}
