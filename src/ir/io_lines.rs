//! Normalized-line label files.
//!
//! One box per line: `<class_index> <x_center> <y_center> <w> <h>`, with the
//! four coordinates normalized to the image size and written at 6 decimal
//! places. `class_index` is the label's position in the vocabulary at save time.
//!
//! Reading is lenient: a malformed line is skipped and reported as a
//! [`ParseWarning`], never a hard error.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::bbox::NormalizedRect;
use super::codec;
use super::model::Detection;
use super::vocab::LabelVocabulary;
use crate::error::ReviewError;
use crate::store::{BoxStore, ParseWarning};

/// File extension for normalized-line files.
pub const LINES_EXTENSION: &str = "txt";

/// One well-formed line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineRecord {
    /// 1-based line number in the source text.
    pub line: usize,
    pub class_index: usize,
    pub rect: NormalizedRect,
}

/// The well-formed rows of a normalized-line file plus warnings for the rest.
#[derive(Clone, Debug, Default)]
pub struct ParsedLines {
    pub path: Option<PathBuf>,
    pub rows: Vec<LineRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Parses normalized-line text. Blank lines are ignored.
pub fn parse_lines(content: &str, path: Option<&Path>) -> ParsedLines {
    let mut parsed = ParsedLines {
        path: path.map(Path::to_path_buf),
        ..Default::default()
    };

    for (line_idx, line) in content.lines().enumerate() {
        let line_num = line_idx + 1;
        match parse_line(line) {
            Ok(None) => {}
            Ok(Some((class_index, rect))) => parsed.rows.push(LineRecord {
                line: line_num,
                class_index,
                rect,
            }),
            Err(message) => {
                warn!(line = line_num, %message, "skipping malformed label line");
                parsed
                    .warnings
                    .push(ParseWarning::new(parsed.path.clone(), line_num, message));
            }
        }
    }

    parsed
}

/// Reads and parses a normalized-line file.
pub fn read_lines_file(path: &Path) -> Result<ParsedLines, ReviewError> {
    let content = fs::read_to_string(path).map_err(ReviewError::Io)?;
    Ok(parse_lines(&content, Some(path)))
}

/// Formats a single line with fixed 6-decimal precision.
pub fn format_line(class_index: usize, rect: &NormalizedRect) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        class_index, rect.x_center, rect.y_center, rect.w, rect.h
    )
}

/// Renders a store's live boxes, one line each, in snapshot order.
///
/// Fails with `UnknownLabel` if a box carries a label that is no longer in
/// the vocabulary, since the format can only encode a class index.
pub fn render_store(store: &BoxStore, vocab: &LabelVocabulary) -> Result<String, ReviewError> {
    let mut out = String::new();
    for b in store.boxes() {
        let class_index = vocab
            .index_of(&b.label)
            .ok_or_else(|| ReviewError::UnknownLabel {
                label: b.label.clone(),
                known: vocab.describe(),
            })?;
        let rect = store.normalized(b)?;
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{}", format_line(class_index, &rect));
    }
    Ok(out)
}

/// Renders raw detections using the detector's own class indices.
///
/// Detections that cannot be normalized for the image are left out and
/// logged; the rest of the file stays usable on its own.
pub fn render_detections(detections: &[Detection], image_width: u32, image_height: u32) -> String {
    let mut out = String::new();
    for detection in detections {
        match codec::to_normalized(
            &detection.bbox.to_rect(),
            image_width as f64,
            image_height as f64,
        ) {
            Ok(rect) => {
                let _ = writeln!(out, "{}", format_line(detection.class_index, &rect));
            }
            Err(err) => {
                warn!(label = %detection.label, error = %err, "leaving detection out of prediction file");
            }
        }
    }
    out
}

/// Renders a class-name file: one name per line, indexed by line number.
/// Gaps in the index space get `class_<n>`.
pub fn render_classes(class_names: &BTreeMap<usize, String>) -> String {
    let Some((&last, _)) = class_names.last_key_value() else {
        return String::new();
    };
    (0..=last)
        .map(|index| match class_names.get(&index) {
            Some(name) => format!("{name}\n"),
            None => format!("class_{index}\n"),
        })
        .collect()
}

/// Reads a class-name file. A missing file yields no names.
///
/// Blank lines keep their index so later names stay aligned.
pub fn read_class_names(path: &Path) -> Result<Vec<String>, ReviewError> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(ReviewError::Io)?;
    Ok(content.lines().map(|line| line.trim().to_string()).collect())
}

fn parse_line(line: &str) -> Result<Option<(usize, NormalizedRect)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        let found = if tokens.len() > 5 {
            "more than 5".to_string()
        } else {
            tokens.len().to_string()
        };
        return Err(format!("expected 5 tokens, found {found}"));
    }

    let class_index = tokens[0].parse::<usize>().map_err(|_| {
        format!(
            "invalid class index '{}'; expected non-negative integer",
            tokens[0]
        )
    })?;

    let x_center = parse_f64_token(tokens[1], "x_center")?;
    let y_center = parse_f64_token(tokens[2], "y_center")?;
    let w = parse_f64_token(tokens[3], "w")?;
    let h = parse_f64_token(tokens[4], "h")?;

    Ok(Some((class_index, NormalizedRect::new(x_center, y_center, w, h))))
}

fn parse_f64_token(raw: &str, field_name: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!(
            "invalid {field_name} '{raw}'; expected finite floating-point number"
        )),
    }
}

/// Fuzz-only entrypoint for single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_line(input: &str) -> Result<(), String> {
    let _ = parse_line(input)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BBoxXYXY, PixelRect};

    #[test]
    fn parse_line_accepts_valid_rows() {
        let parsed = parse_line("2 0.5 0.25 0.3 0.1")
            .expect("parse should succeed")
            .expect("line should produce a row");
        assert_eq!(parsed, (2, NormalizedRect::new(0.5, 0.25, 0.3, 0.1)));
    }

    #[test]
    fn parse_line_skips_empty_rows() {
        assert!(parse_line("   ").expect("parse should succeed").is_none());
    }

    #[test]
    fn parse_line_rejects_wrong_token_counts() {
        assert!(parse_line("0 0.1 0.2").is_err());
        assert!(parse_line("0 0.1 0.2 0.3 0.4 0.5").is_err());
    }

    #[test]
    fn parse_line_rejects_bad_numbers() {
        assert!(parse_line("-1 0.1 0.2 0.3 0.4").is_err());
        assert!(parse_line("0 abc 0.2 0.3 0.4").is_err());
        assert!(parse_line("0 NaN 0.2 0.3 0.4").is_err());
    }

    #[test]
    fn parse_lines_collects_warnings_with_line_numbers() {
        let parsed = parse_lines(
            "0 0.5 0.5 0.2 0.2\n\n0 0.5 0.5\n1 0.1 0.1 0.1 0.1\n",
            Some(Path::new("labels/a.txt")),
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].line, 4);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 3);
        assert_eq!(
            parsed.warnings[0].path.as_deref(),
            Some(Path::new("labels/a.txt"))
        );
    }

    #[test]
    fn format_line_uses_six_decimals() {
        let line = format_line(1, &NormalizedRect::new(0.2, 0.3, 0.2, 0.2));
        assert_eq!(line, "1 0.200000 0.300000 0.200000 0.200000");
    }

    #[test]
    fn render_store_uses_vocabulary_positions() {
        let mut vocab = LabelVocabulary::new(["Person", "Vehicle"]);
        let mut store = BoxStore::new(100, 50);
        store
            .add_human_box(PixelRect::new(10.0, 10.0, 20.0, 10.0), "Vehicle", &mut vocab)
            .unwrap();

        let text = render_store(&store, &vocab).expect("render");
        assert_eq!(text, "1 0.200000 0.300000 0.200000 0.200000\n");
    }

    #[test]
    fn render_store_rejects_orphaned_labels() {
        let vocab = LabelVocabulary::new(["Person"]);
        let mut store = BoxStore::new(10, 10);
        store
            .seed_from_persisted(&parse_lines("3 0.5 0.5 0.5 0.5", None), &vocab)
            .unwrap();

        let err = render_store(&store, &vocab).unwrap_err();
        assert!(matches!(err, ReviewError::UnknownLabel { .. }));
    }

    #[test]
    fn render_detections_skips_unusable_boxes() {
        let detections = vec![
            Detection {
                bbox: BBoxXYXY::from_xyxy(0.0, 0.0, 50.0, 25.0),
                confidence: 0.3,
                label: "car".into(),
                class_index: 2,
            },
            Detection {
                bbox: BBoxXYXY::from_xyxy(10.0, 10.0, 10.0, 20.0),
                confidence: 0.1,
                label: "car".into(),
                class_index: 2,
            },
        ];

        let text = render_detections(&detections, 100, 50);
        assert_eq!(text, "2 0.250000 0.250000 0.500000 0.500000\n");
    }

    #[test]
    fn render_classes_fills_gaps() {
        let names = BTreeMap::from([(0, "person".to_string()), (2, "car".to_string())]);
        assert_eq!(render_classes(&names), "person\nclass_1\ncar\n");
        assert_eq!(render_classes(&BTreeMap::new()), "");
    }

    #[test]
    fn read_class_names_keeps_positions() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("classes.txt");
        fs::write(&path, "person\n\ncar \n").expect("write classes");

        let names = read_class_names(&path).expect("read classes");
        assert_eq!(names, vec!["person", "", "car"]);

        let missing = read_class_names(&temp.path().join("missing.txt")).expect("missing is empty");
        assert!(missing.is_empty());
    }
}
