use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use anyhow::anyhow;
use tracing::{error, info};

use super::{Detection, EngineOptions, OcrEngine, OcrError, PreprocessedImage, TesseractEngine};

/// Engine handle handed to request handlers. `None` means the engine failed
/// to load and every request must be refused.
pub type EngineSlot = Option<Arc<dyn OcrEngine>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineLifecycle {
    /// Loaded once at startup and shared by every request.
    #[default]
    Shared,
    /// Loaded and dropped inside each request.
    PerRequest,
}

impl FromStr for EngineLifecycle {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shared" | "singleton" => Ok(Self::Shared),
            "per-request" | "per_request" => Ok(Self::PerRequest),
            other => Err(anyhow!(
                "unknown ocr lifecycle: {} (expected \"shared\" or \"per-request\")",
                other
            )),
        }
    }
}

/// Builds a fresh engine for every `detect_text` call.
pub struct PerRequestEngine<F> {
    factory: F,
}

impl<F> PerRequestEngine<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F, E> OcrEngine for PerRequestEngine<F>
where
    F: Fn() -> Result<E, OcrError> + Send + Sync,
    E: OcrEngine,
{
    fn detect_text(&self, image: &PreprocessedImage) -> Result<Vec<Detection>, OcrError> {
        let engine = (self.factory)()?;
        engine.detect_text(image)
    }
}

/// Write-once holder for a shared engine.
///
/// The first `install` runs its factory; the outcome, success or failure, is
/// kept for the life of the cell and later calls return it unchanged.
pub struct EngineCell {
    slot: OnceLock<EngineSlot>,
}

impl EngineCell {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    pub fn install<F, E>(&self, factory: F) -> EngineSlot
    where
        F: FnOnce() -> Result<E, OcrError>,
        E: OcrEngine + 'static,
    {
        self.slot
            .get_or_init(|| match factory() {
                Ok(engine) => {
                    info!("shared OCR engine loaded");
                    Some(Arc::new(engine) as Arc<dyn OcrEngine>)
                }
                Err(err) => {
                    error!(error = %err, "shared OCR engine unavailable");
                    None
                }
            })
            .clone()
    }

    #[cfg(test)]
    fn get(&self) -> EngineSlot {
        self.slot.get().cloned().flatten()
    }
}

static SHARED_ENGINE: EngineCell = EngineCell::new();

/// Process-wide engine cell used by the server.
pub fn shared_engine() -> &'static EngineCell {
    &SHARED_ENGINE
}

pub fn build_engine(lifecycle: EngineLifecycle, options: EngineOptions) -> EngineSlot {
    match lifecycle {
        EngineLifecycle::Shared => {
            shared_engine().install(|| TesseractEngine::initialize(&options))
        }
        EngineLifecycle::PerRequest => {
            info!("OCR engine will be loaded per request");
            let engine = PerRequestEngine::new(move || TesseractEngine::initialize(&options));
            Some(Arc::new(engine) as Arc<dyn OcrEngine>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(&'static str);

    impl OcrEngine for Fixed {
        fn detect_text(&self, _: &PreprocessedImage) -> Result<Vec<Detection>, OcrError> {
            Ok(vec![Detection::new(self.0)])
        }
    }

    fn blank() -> PreprocessedImage {
        crate::ocr::preprocess(image::DynamicImage::new_luma8(2, 2), 1000)
    }

    #[test]
    fn lifecycle_parses_known_names() {
        assert_eq!("shared".parse::<EngineLifecycle>().unwrap(), EngineLifecycle::Shared);
        assert_eq!(
            " Per-Request ".parse::<EngineLifecycle>().unwrap(),
            EngineLifecycle::PerRequest
        );
        assert!("lazy".parse::<EngineLifecycle>().is_err());
    }

    #[test]
    fn per_request_engine_builds_on_every_call() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let engine = PerRequestEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Fixed("hi"))
        });
        let image = blank();
        engine.detect_text(&image).expect("first");
        let detections = engine.detect_text(&image).expect("second");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(detections[0].text, "hi");
    }

    #[test]
    fn per_request_engine_surfaces_initialization_errors() {
        let engine = PerRequestEngine::new(|| {
            Err::<Fixed, _>(OcrError::Initialization("no model".to_string()))
        });
        let err = engine.detect_text(&blank()).expect_err("init error");
        assert!(matches!(err, OcrError::Initialization(_)));
    }

    #[test]
    fn per_request_lifecycle_defers_tesseract_failures_to_the_request() {
        let options = EngineOptions {
            languages: vec!["eng".to_string()],
            use_accelerator: false,
            binary: "/nonexistent/ocr-decoder-tesseract".to_string(),
            psm: 6,
        };
        let engine = build_engine(EngineLifecycle::PerRequest, options).expect("slot");
        let err = engine.detect_text(&blank()).expect_err("init error");
        assert!(matches!(err, OcrError::Initialization(_)));
    }

    #[test]
    fn cell_runs_factory_once_and_shares_the_handle() {
        let cell = EngineCell::new();
        let builds = AtomicUsize::new(0);
        let first = cell.install(|| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Fixed("once"))
        });
        let second = cell.install(|| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Fixed("twice"))
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        let (first, second) = (first.expect("first"), second.expect("second"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.detect_text(&blank()).unwrap()[0].text, "once");
        assert!(cell.get().is_some());
    }

    #[test]
    fn failed_install_is_never_retried() {
        let cell = EngineCell::new();
        let failed = cell.install(|| {
            Err::<Fixed, _>(OcrError::Initialization("weights missing".to_string()))
        });
        assert!(failed.is_none());
        let retried = cell.install(|| Ok(Fixed("late")));
        assert!(retried.is_none());
        assert!(cell.get().is_none());
    }

    #[test]
    fn shared_handle_serves_concurrent_readers() {
        let cell = EngineCell::new();
        let engine = cell.install(|| Ok(Fixed("abc"))).expect("engine");
        let handles = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.detect_text(&blank()).expect("detect"))
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join().expect("join")[0].text, "abc");
        }
    }
}
