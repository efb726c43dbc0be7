//! In-process stand-in for a headless browser and the render target it loads.
//!
//! Each view can be told how to behave (render a solid colour, hang, fail to load,
//! ...). Counters record every launch, termination and context open/close so
//! tests can assert that nothing leaks.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::driver::{BrowserLauncher, BrowserProcess, BrowsingContext, SurfaceExport};
use crate::capture::types::{CameraSettings, ViewName};
use crate::configuration::types::ViewportConfig;
use crate::error_handling::types::{BrowserError, LaunchError};

#[derive(Debug, Clone)]
pub enum ViewBehavior {
    /// Loads immediately and draws a canvas filling the viewport
    Render { rgb: [u8; 3], load_delay: Duration },
    /// Navigation never completes
    Hang,
    /// Navigation fails with the given network error
    LoadError(String),
    /// Loads but never presents a canvas
    NoSurface,
    /// Presents a canvas whose export fails
    EncodeFailure(String),
    /// Presents a canvas whose export returns bytes that are not a PNG
    Garbage,
    /// Panics while exporting
    Panic,
}

impl ViewBehavior {
    pub fn solid(rgb: [u8; 3]) -> Self {
        ViewBehavior::Render {
            rgb,
            load_delay: Duration::ZERO,
        }
    }

    pub fn slow(rgb: [u8; 3], load_delay: Duration) -> Self {
        ViewBehavior::Render { rgb, load_delay }
    }
}

#[derive(Debug, Default)]
pub struct FakeCounters {
    launches: AtomicUsize,
    terminations: AtomicUsize,
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    applied_settings: Mutex<Vec<CameraSettings>>,
    exports: Mutex<Vec<(ViewName, Instant)>>,
}

impl FakeCounters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn contexts_opened(&self) -> usize {
        self.contexts_opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts_opened() - self.contexts_closed()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn applied_settings(&self) -> Vec<CameraSettings> {
        self.applied_settings.lock().unwrap().clone()
    }

    /// When each view's surface was successfully exported.
    pub fn export_time(&self, view: ViewName) -> Option<Instant> {
        self.exports
            .lock()
            .unwrap()
            .iter()
            .find(|(v, _)| *v == view)
            .map(|(_, at)| *at)
    }
}

#[derive(Debug, Clone)]
pub struct FakeLauncher {
    front: ViewBehavior,
    back: ViewBehavior,
    fail_launch: bool,
    counters: Arc<FakeCounters>,
}

impl FakeLauncher {
    pub fn rendering(behavior: ViewBehavior) -> Self {
        Self::per_view(behavior.clone(), behavior)
    }

    pub fn per_view(front: ViewBehavior, back: ViewBehavior) -> Self {
        Self {
            front,
            back,
            fail_launch: false,
            counters: Arc::new(FakeCounters::default()),
        }
    }

    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::rendering(ViewBehavior::NoSurface)
        }
    }

    pub fn counters(&self) -> Arc<FakeCounters> {
        Arc::clone(&self.counters)
    }
}

impl BrowserLauncher for FakeLauncher {
    type Process = FakeProcess;

    async fn launch(&self) -> Result<FakeProcess, LaunchError> {
        if self.fail_launch {
            return Err(LaunchError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "fake browser refuses to start",
            )));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(FakeProcess {
            front: self.front.clone(),
            back: self.back.clone(),
            counters: Arc::clone(&self.counters),
        })
    }
}

#[derive(Debug)]
pub struct FakeProcess {
    front: ViewBehavior,
    back: ViewBehavior,
    counters: Arc<FakeCounters>,
}

impl BrowserProcess for FakeProcess {
    type Context = FakeContext;

    async fn open_context(&self) -> Result<FakeContext, BrowserError> {
        self.counters.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeContext {
            front: self.front.clone(),
            back: self.back.clone(),
            counters: Arc::clone(&self.counters),
            viewport: None,
            view: None,
        })
    }

    async fn terminate(self) -> Result<(), BrowserError> {
        self.counters.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeContext {
    front: ViewBehavior,
    back: ViewBehavior,
    counters: Arc<FakeCounters>,
    viewport: Option<ViewportConfig>,
    view: Option<ViewName>,
}

impl FakeContext {
    fn behavior(&self) -> Result<&ViewBehavior, BrowserError> {
        match self.view {
            Some(ViewName::Front) => Ok(&self.front),
            Some(ViewName::Back) => Ok(&self.back),
            None => Err(BrowserError::Evaluation("no page loaded".to_string())),
        }
    }

    fn render(&self, rgb: [u8; 3]) -> Result<Vec<u8>, BrowserError> {
        let viewport = self
            .viewport
            .ok_or_else(|| BrowserError::Evaluation("viewport not set".to_string()))?;
        let (width, height) = viewport.pixel_size();
        let canvas = RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(bytes)
    }
}

impl BrowsingContext for FakeContext {
    async fn set_viewport(&mut self, viewport: &ViewportConfig) -> Result<(), BrowserError> {
        self.viewport = Some(*viewport);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.counters.navigations.lock().unwrap().push(url.to_string());
        self.view = match url.rsplit('/').next() {
            Some("front") => Some(ViewName::Front),
            Some("back") => Some(ViewName::Back),
            _ => return Err(BrowserError::Navigation(format!("unknown view in {}", url))),
        };

        match self.behavior()?.clone() {
            ViewBehavior::Hang => std::future::pending().await,
            ViewBehavior::LoadError(e) => Err(BrowserError::Navigation(e)),
            ViewBehavior::Render { load_delay, .. } => {
                tokio::time::sleep(load_delay).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn apply_settings(&mut self, settings: &CameraSettings) -> Result<(), BrowserError> {
        self.counters
            .applied_settings
            .lock()
            .unwrap()
            .push(settings.clone());
        Ok(())
    }

    async fn export_surface(&mut self) -> Result<SurfaceExport, BrowserError> {
        let export = match self.behavior()?.clone() {
            ViewBehavior::Render { rgb, .. } => SurfaceExport::Encoded(self.render(rgb)?),
            ViewBehavior::NoSurface => return Ok(SurfaceExport::Missing),
            ViewBehavior::EncodeFailure(e) => return Ok(SurfaceExport::Failed(e)),
            ViewBehavior::Garbage => SurfaceExport::Encoded(b"not a png".to_vec()),
            ViewBehavior::Panic => panic!("render target crashed"),
            ViewBehavior::Hang | ViewBehavior::LoadError(_) => {
                return Err(BrowserError::Evaluation("page never loaded".to_string()))
            }
        };
        if let Some(view) = self.view {
            self.counters
                .exports
                .lock()
                .unwrap()
                .push((view, Instant::now()));
        }
        Ok(export)
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.counters.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
