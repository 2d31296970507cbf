use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc;

/// How to invoke yt-dlp.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub program: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub job_id: u64,
    pub url: String,
    pub dest_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub job_id: u64,
    pub url: String,
    pub result: Result<(), String>,
}

/// Runs yt-dlp jobs on a background runtime; the UI collects results by
/// polling.
pub struct Downloader {
    request_sender: mpsc::UnboundedSender<DownloadRequest>,
    result_receiver: Mutex<mpsc::UnboundedReceiver<DownloadOutcome>>,
    next_job_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
}

impl Downloader {
    pub fn new(settings: DownloadSettings) -> anyhow::Result<Self> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<DownloadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<DownloadOutcome>();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create download runtime: {}", e))?;

        let worker_in_flight = Arc::clone(&in_flight);
        thread::Builder::new()
            .name("downloader".to_string())
            .spawn(move || {
                rt.block_on(async {
                    while let Some(request) = request_rx.recv().await {
                        let settings = settings.clone();
                        let result_tx = result_tx.clone();
                        let in_flight = Arc::clone(&worker_in_flight);

                        tokio::spawn(async move {
                            let outcome = run_download(&settings, request).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            if let Err(e) = result_tx.send(outcome) {
                                log::error!("Failed to send download result: {}", e);
                            }
                        });
                    }
                });
                log::debug!("Download worker exiting");
            })?;

        Ok(Self {
            request_sender: request_tx,
            result_receiver: Mutex::new(result_rx),
            next_job_id: AtomicU64::new(1),
            in_flight,
        })
    }

    /// Queue a download into `dest_dir` (non-blocking).
    pub fn request(&self, url: &str, dest_dir: &Path) -> anyhow::Result<u64> {
        let url = url.trim();
        if url.is_empty() {
            return Err(anyhow::anyhow!("Please enter a URL!"));
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let request = DownloadRequest {
            job_id,
            url: url.to_string(),
            dest_dir: dest_dir.to_path_buf(),
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.request_sender.send(request) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow::anyhow!("Download worker is not running: {}", e));
        }

        log::info!("Queued download {} for {}", job_id, url);
        Ok(job_id)
    }

    /// Finished downloads since the last call (non-blocking).
    pub fn poll_completed(&self) -> Vec<DownloadOutcome> {
        let mut results = Vec::new();

        if let Ok(mut receiver) = self.result_receiver.lock() {
            while let Ok(result) = receiver.try_recv() {
                results.push(result);
            }
        }

        results
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

pub fn download_args(settings: &DownloadSettings, url: &str, dest_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--no-playlist".into()];
    if let Some(ref ffmpeg) = settings.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.into());
    }
    args.extend(
        ["--extract-audio", "--audio-format", "mp3", "--audio-quality", "0", "-o"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(dest_dir.join("%(title)s.%(ext)s").into());
    args.push(url.into());
    args
}

async fn run_download(settings: &DownloadSettings, request: DownloadRequest) -> DownloadOutcome {
    log::info!("Downloading {} into {}", request.url, request.dest_dir.display());

    let output = tokio::process::Command::new(&settings.program)
        .args(download_args(settings, &request.url, &request.dest_dir))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    let result = match output {
        Ok(output) if output.status.success() => {
            log::info!("Download {} completed", request.job_id);
            Ok(())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("");
            log::warn!("Download {} failed ({}): {}", request.job_id, output.status, detail);
            Err(format!("Download failed! Make sure the URL is valid. {}", detail).trim_end().to_string())
        }
        Err(e) => {
            log::error!("Failed to run {}: {}", settings.program.display(), e);
            Err(format!("Download error: {}", e))
        }
    };

    DownloadOutcome {
        job_id: request.job_id,
        url: request.url,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn settings(program: &str) -> DownloadSettings {
        DownloadSettings {
            program: PathBuf::from(program),
            ffmpeg_location: None,
        }
    }

    fn wait_for_outcome(downloader: &Downloader) -> DownloadOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(outcome) = downloader.poll_completed().pop() {
                return outcome;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("download did not finish in time");
    }

    #[test]
    fn test_download_args() {
        let mut settings = settings("yt-dlp");
        settings.ffmpeg_location = Some(PathBuf::from("/opt/ffmpeg/bin"));

        let args = download_args(&settings, "https://example.com/watch?v=1", Path::new("/music"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(args, vec![
            "--no-playlist",
            "--ffmpeg-location", "/opt/ffmpeg/bin",
            "--extract-audio",
            "--audio-format", "mp3",
            "--audio-quality", "0",
            "-o", "/music/%(title)s.%(ext)s",
            "https://example.com/watch?v=1",
        ]);
    }

    #[test]
    fn test_download_args_without_ffmpeg_location() {
        let args = download_args(&settings("yt-dlp"), "url", Path::new("/music"));
        assert!(!args.iter().any(|a| a == "--ffmpeg-location"));
        assert_eq!(args.last().unwrap(), "url");
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let downloader = Downloader::new(settings("true")).unwrap();
        assert!(downloader.request("   ", Path::new("/tmp")).is_err());
        assert_eq!(downloader.in_flight(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_download() {
        let downloader = Downloader::new(settings("true")).unwrap();
        let job_id = downloader.request("https://example.com/a", Path::new("/tmp")).unwrap();

        let outcome = wait_for_outcome(&downloader);
        assert_eq!(outcome.job_id, job_id);
        assert_eq!(outcome.url, "https://example.com/a");
        assert!(outcome.result.is_ok());
        assert_eq!(downloader.in_flight(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_download_reports_error() {
        let downloader = Downloader::new(settings("false")).unwrap();
        downloader.request("https://example.com/bad", Path::new("/tmp")).unwrap();

        let outcome = wait_for_outcome(&downloader);
        let message = outcome.result.unwrap_err();
        assert!(message.contains("Make sure the URL is valid"));
    }

    #[test]
    fn test_missing_downloader_reports_error() {
        let downloader = Downloader::new(settings("/nonexistent/yt-dlp")).unwrap();
        downloader.request("https://example.com/a", Path::new("/tmp")).unwrap();

        let outcome = wait_for_outcome(&downloader);
        assert!(outcome.result.unwrap_err().starts_with("Download error"));
    }
}
