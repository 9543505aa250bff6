use anyhow::{Context, bail};
use futures::{Stream, StreamExt, stream};
use rolling_motion::{MotionStage, Tracker, TrackerConfig, sort_by_area_desc};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type ImageFrame = Arc<image::RgbImage>;

fn frame_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn load_frame(path: &Path) -> Option<ImageFrame> {
    match image::open(path) {
        Ok(img) => Some(Arc::new(img.to_rgb8())),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping undecodable file");
            None
        }
    }
}

/// Decodes `paths` off the runtime threads, up to `ahead` files in front of the
/// consumer. Undecodable files are skipped and every frame keeps its path.
fn decode_frames(
    paths: Vec<PathBuf>,
    ahead: usize,
) -> impl Stream<Item = anyhow::Result<(PathBuf, ImageFrame)>> {
    stream::iter(paths)
        .map(|path| {
            tokio::task::spawn_blocking(move || {
                let frame = load_frame(&path);
                (path, frame)
            })
        })
        .buffered(ahead.max(1))
        .filter_map(|joined| async move {
            match joined {
                Ok((path, frame)) => frame.map(|frame| Ok((path, frame))),
                Err(err) => Some(Err(anyhow::Error::new(err).context("decoder task failed"))),
            }
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rolling_motion=debug".parse()?),
        )
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: frame_tester <frames_dir> [config.toml]");
    }
    let frames_dir = PathBuf::from(&args[1]);
    let config = match args.get(2) {
        Some(path) => TrackerConfig::load_from(path).with_context(|| format!("loading {path}"))?,
        None => TrackerConfig::load().context("loading rolling_motion.toml")?,
    };
    let paths = frame_paths(&frames_dir)?;
    info!(frames = paths.len(), dir = %frames_dir.display(), "found frame files");

    // --- 2. Motion Stage Initialization ---
    let threshold = config.threshold;
    let queue_depth = config.stage_queue_depth;
    let tracker: Tracker<ImageFrame> = Tracker::new(&config)?;
    let stage = MotionStage::spawn(tracker, queue_depth);

    // --- 3. Main Processing Loop ---
    let mut decoded = std::pin::pin!(decode_frames(paths, queue_depth));
    while let Some(item) = decoded.next().await {
        let (path, frame) = item?;
        let rects = stage
            .submit(frame, threshold)
            .await
            .with_context(|| format!("tracking {}", path.display()))?;
        let mut rects = config.filter.apply(rects);
        sort_by_area_desc(&mut rects);
        if !rects.is_empty() {
            info!(file = %path.display(), count = rects.len(), ?rects, "motion");
        }
    }

    // --- 4. Cleanup ---
    let tracked = stage.shutdown().await?;
    info!(tracked, "done");
    Ok(())
}
