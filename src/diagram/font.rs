use std::path::PathBuf;
use std::sync::OnceLock;

use log::{debug, warn};
use plotters::style::{FontStyle, register_font};

/// Family name labels are drawn with.
pub const FAMILY: &str = "sans-serif";
/// Overrides the font file used for bitmap labels.
pub const FONT_ENV: &str = "SEMFIT_FONT";

/// Fonts tried in order. CJK-capable faces come first so Japanese factor
/// names render as text.
const CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
    "C:\\Windows\\Fonts\\meiryo.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register a label font with plotters, once per process.
///
/// Returns `false` when no candidate could be loaded; bitmap output then
/// has no text.
pub fn ensure_font() -> bool {
    *REGISTERED.get_or_init(|| {
        for path in candidates() {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps registered fonts for the life of the process
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    debug!("diagram labels use {}", path.display());
                    return true;
                }
                Err(_) => debug!("cannot use font {}: invalid font data", path.display()),
            }
        }
        warn!("no usable font found (set {FONT_ENV}); PNG diagram labels are omitted");
        false
    })
}

fn candidates() -> Vec<PathBuf> {
    std::env::var_os(FONT_ENV)
        .map(PathBuf::from)
        .into_iter()
        .chain(CANDIDATES.iter().map(PathBuf::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_list_is_not_empty() {
        assert!(candidates().len() >= CANDIDATES.len());
    }

    #[test]
    fn registration_result_is_stable() {
        assert_eq!(ensure_font(), ensure_font());
    }
}
