use std::io::Write;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use super::parse::parse_tsv_lines;
use crate::ocr::{Detection, OcrEngine, OcrError, PreprocessedImage};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub languages: Vec<String>,
    pub use_accelerator: bool,
    pub binary: String,
    pub psm: u32,
}

/// OCR engine backed by the `tesseract` command line tool.
///
/// The handle only holds the resolved language set and invocation flags, so
/// concurrent `detect_text` calls each spawn their own process.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    languages: String,
    psm: u32,
}

impl TesseractEngine {
    pub fn initialize(options: &EngineOptions) -> Result<Self, OcrError> {
        if options.use_accelerator {
            warn!("tesseract has no accelerator support; running on CPU");
        }
        let available = list_tesseract_languages(&options.binary)?;
        let languages = select_languages(&options.languages, &available)?;
        info!(binary = %options.binary, languages = %languages, "tesseract engine ready");
        Ok(Self {
            binary: options.binary.clone(),
            languages,
            psm: options.psm,
        })
    }

    fn run_tsv(&self, path: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--oem")
            .arg("1")
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .map_err(|err| {
                OcrError::Inference(format!("failed to run {}: {}", self.binary, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Inference(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrEngine for TesseractEngine {
    fn detect_text(&self, image: &PreprocessedImage) -> Result<Vec<Detection>, OcrError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("ocr-decoder-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| OcrError::Inference(format!("failed to create temp file: {}", err)))?;
        image
            .as_gray()
            .write_to(&mut tmp, image::ImageFormat::Png)
            .map_err(|err| OcrError::Inference(format!("failed to write temp image: {}", err)))?;
        tmp.flush()
            .map_err(|err| OcrError::Inference(format!("failed to flush temp image: {}", err)))?;

        let tsv = self.run_tsv(tmp.path())?;
        let detections = parse_tsv_lines(&tsv);
        debug!(count = detections.len(), "tesseract detections");
        Ok(detections)
    }
}

pub fn list_tesseract_languages(binary: &str) -> Result<Vec<String>, OcrError> {
    let output = Command::new(binary)
        .arg("--list-langs")
        .output()
        .map_err(|err| {
            OcrError::Initialization(format!("failed to run {} --list-langs: {}", binary, err))
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OcrError::Initialization(format!(
            "{} --list-langs failed: {}",
            binary,
            stderr.trim()
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    // First line is the "List of available languages ..." banner.
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn select_languages(requested: &[String], available: &[String]) -> Result<String, OcrError> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in requested.iter().flat_map(|value| value.split(['+', ',', ' '])) {
        let lang = raw.trim();
        if lang.is_empty() || chosen.iter().any(|value| value == lang) {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(OcrError::Initialization(format!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        )));
    }
    if !missing.is_empty() {
        warn!(
            missing = %missing.join(", "),
            available = %available.join(", "),
            "some ocr languages are not installed"
        );
    }

    Ok(chosen.join("+"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn language_list_skips_banner_and_blanks() {
        let stdout = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\n\nosd\nspa\n";
        assert_eq!(parse_language_list(stdout), langs(&["eng", "osd", "spa"]));
    }

    #[test]
    fn requested_languages_are_intersected_with_installed() {
        let available = langs(&["eng", "spa"]);
        let chosen = select_languages(&langs(&["eng+deu", "spa", "eng"]), &available)
            .expect("languages");
        assert_eq!(chosen, "eng+spa");
    }

    #[test]
    fn no_installed_language_is_an_initialization_error() {
        let err = select_languages(&langs(&["jpn"]), &langs(&["eng"])).expect_err("missing");
        assert!(matches!(err, OcrError::Initialization(message) if message.contains("jpn")));
    }

    fn options(binary: &str) -> EngineOptions {
        EngineOptions {
            languages: langs(&["eng"]),
            use_accelerator: false,
            binary: binary.to_string(),
            psm: 7,
        }
    }

    #[test]
    fn missing_binary_fails_initialization() {
        let err = TesseractEngine::initialize(&options("/nonexistent/ocr-decoder-tesseract"))
            .expect_err("no binary");
        assert!(matches!(err, OcrError::Initialization(_)));
    }

    /// Writes an executable shell script standing in for `tesseract`.
    #[cfg(unix)]
    fn fake_tesseract(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    const LIST_LANGS: &str = r#"if [ "$1" = "--list-langs" ]; then
  echo 'List of available languages in "/tessdata/" (2):'
  echo eng
  echo osd
  exit 0
fi
"#;

    #[cfg(unix)]
    #[test]
    fn detect_text_runs_tesseract_and_groups_lines() {
        use crate::ocr::{clean_detections, preprocess};
        use image::DynamicImage;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = format!(
            r#"{}[ -s "$1" ] || {{ echo "no image at $1" >&2; exit 3; }}
if [ "$2 $3 $4 $5 $6 $7 $8 $9" != "stdout -l eng --oem 1 --psm 7 tsv" ]; then
  echo "unexpected args: $*" >&2
  exit 2
fi
printf 'level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n'
printf '5\t1\t1\t1\t2\t1\t10\t40\t20\t10\t90\tzz\n'
printf '5\t1\t1\t1\t1\t2\t40\t10\t20\t10\t80\tc1\n'
printf '5\t1\t1\t1\t1\t1\t10\t10\t20\t10\t96\tab-\n'
"#,
            LIST_LANGS
        );
        let binary = fake_tesseract(dir.path(), &script);

        let engine = TesseractEngine::initialize(&options(&binary)).expect("initialize");
        let prepared = preprocess(DynamicImage::new_luma8(32, 16), 1000);
        let detections = engine.detect_text(&prepared).expect("detect");

        let texts: Vec<&str> = detections.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["ab- c1", "zz"]);
        assert_eq!(clean_detections(&detections).as_str(), "ABC1ZZ");
    }

    #[cfg(unix)]
    #[test]
    fn failing_tesseract_run_is_an_inference_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = format!("{}echo 'read error' >&2\nexit 1\n", LIST_LANGS);
        let binary = fake_tesseract(dir.path(), &script);

        let engine = TesseractEngine::initialize(&options(&binary)).expect("initialize");
        let prepared = crate::ocr::preprocess(image::DynamicImage::new_luma8(4, 4), 1000);
        let err = engine.detect_text(&prepared).expect_err("run fails");
        assert!(matches!(err, OcrError::Inference(message) if message.contains("read error")));
    }
}
