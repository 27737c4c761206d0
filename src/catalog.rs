//! Sample video catalog stored as `videos.json` next to the videos.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DubError, Result};
use crate::probe::Prober;
use crate::process::ToolRunner;

const CATALOG_FILE: &str = "videos.json";
const PREVIEW_HEIGHT: u32 = 640;
const PREVIEW_FPS: u32 = 20;
const PREVIEW_SECONDS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    /// `MM:SS`
    pub duration: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    videos: Vec<VideoEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoPage {
    pub page: usize,
    pub page_size: usize,
    pub total_videos: usize,
    pub total_pages: usize,
    pub videos: Vec<VideoEntry>,
}

pub struct Catalog {
    dir: PathBuf,
}

impl Catalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    /// Copies `source` into the catalog, renders its preview and records it.
    /// An existing entry with the same file name is replaced.
    pub async fn add(
        &self,
        source: &Path,
        tags: &[String],
        base_url: Option<&str>,
        runner: &ToolRunner,
        config: &Config,
    ) -> Result<VideoEntry> {
        if !source.is_file() {
            return Err(DubError::MissingAsset {
                kind: "video",
                path: source.to_path_buf(),
            });
        }
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DubError::Catalog(format!("unusable file name: {}", source.display())))?
            .to_string();
        let stem = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video")
            .to_string();

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut catalog = self.load_or_init().await?;

        let stored = self.dir.join(&name);
        if stored != source {
            tokio::fs::copy(source, &stored).await?;
        }

        let preview_name = format!("{stem}_preview.mp4");
        render_preview(runner, config, &stored, &self.dir.join(&preview_name)).await?;

        let seconds = Prober::new(runner, &config.ffprobe, config.probe_timeout)
            .duration(&stored)
            .await?;

        let url = match base_url.map(|u| u.trim_end_matches('/')).filter(|u| !u.is_empty()) {
            Some(base) => format!("{base}/{preview_name}"),
            None => format!("videos/{preview_name}"),
        };
        let entry = VideoEntry {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.clone(),
            url,
            duration: format_minutes(seconds),
            tags: normalize_tags(tags),
        };

        catalog.videos.retain(|v| v.name != name);
        catalog.videos.push(entry.clone());
        self.save(&catalog).await?;
        info!(id = %entry.id, name = %entry.name, "video added to catalog");
        Ok(entry)
    }

    /// One page of entries, optionally restricted to those carrying any of `tags`.
    pub async fn list(&self, page: usize, page_size: usize, tags: &[String]) -> Result<VideoPage> {
        if page == 0 || page_size == 0 {
            return Err(DubError::Catalog("page and page size start at 1".into()));
        }
        let catalog = self.load().await?;
        let wanted = normalize_tags(tags);
        let matching: Vec<VideoEntry> = catalog
            .videos
            .into_iter()
            .filter(|v| wanted.is_empty() || v.tags.iter().any(|t| wanted.contains(t)))
            .collect();

        let total_videos = matching.len();
        let total_pages = total_videos.div_ceil(page_size);
        let videos = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(VideoPage {
            page,
            page_size,
            total_videos,
            total_pages,
            videos,
        })
    }

    /// Path of the stored video for `id`.
    pub async fn resolve(&self, id: &str) -> Result<PathBuf> {
        let catalog = self.load().await?;
        let entry = catalog
            .videos
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| DubError::VideoNotFound(id.to_string()))?;
        let path = self.dir.join(&entry.name);
        if !path.is_file() {
            return Err(DubError::VideoNotFound(format!("{id} (missing file {})", path.display())));
        }
        Ok(path)
    }

    async fn load(&self) -> Result<CatalogFile> {
        let path = self.file();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DubError::Catalog(format!("no catalog at {}", path.display())))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    // Missing, empty or corrupt catalogs start over empty.
    async fn load_or_init(&self) -> Result<CatalogFile> {
        match tokio::fs::read_to_string(self.file()).await {
            Ok(raw) if !raw.trim().is_empty() => match serde_json::from_str(&raw) {
                Ok(catalog) => Ok(catalog),
                Err(e) => {
                    warn!(error = %e, "catalog is corrupt; starting a new one");
                    Ok(CatalogFile::default())
                }
            },
            Ok(_) => Ok(CatalogFile::default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CatalogFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, catalog: &CatalogFile) -> Result<()> {
        let body = serde_json::to_string_pretty(catalog)?;
        tokio::fs::write(self.file(), body).await?;
        Ok(())
    }
}

async fn render_preview(runner: &ToolRunner, config: &Config, input: &Path, preview: &Path) -> Result<()> {
    let args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-t".into(),
        PREVIEW_SECONDS.to_string().into(),
        "-vf".into(),
        format!("scale=-2:{PREVIEW_HEIGHT},fps={PREVIEW_FPS}").into(),
        "-an".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        preview.into(),
    ];
    let out = runner.run(&config.ffmpeg, &args, config.encode_timeout).await?;
    if !out.success() {
        return Err(DubError::Encode {
            code: out.code,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn format_minutes(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}
