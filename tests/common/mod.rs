#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// A minimal uncompressed 24-bit BMP; enough for header-only size reads.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Creates `root/images/<name>` BMPs and an optional `project.yaml`.
pub fn create_project(root: &Path, images: &[(&str, u32, u32)], config: Option<&str>) {
    fs::create_dir_all(root.join("images")).expect("create images dir");
    for (name, width, height) in images {
        write_bmp(&root.join("images").join(name), *width, *height);
    }
    if let Some(config) = config {
        fs::write(root.join("project.yaml"), config).expect("write project.yaml");
    }
}

/// The A/B/C mining scenario: A has no detections, B one at 0.6, C one at 0.3.
pub const ABC_DETECTIONS: &str = r#"{
    "names": {"0": "person", "1": "car"},
    "images": {
        "a.bmp": [],
        "b.bmp": [{"bbox": [10, 10, 50, 40], "confidence": 0.6, "class": 1}],
        "c.bmp": [{"bbox": [20, 10, 60, 30], "confidence": 0.3, "class": 0}]
    }
}"#;

pub fn create_abc_project(root: &Path, config: Option<&str>) {
    create_project(
        root,
        &[("a.bmp", 100, 50), ("b.bmp", 100, 50), ("c.bmp", 100, 50)],
        config,
    );
    fs::write(root.join("detections.json"), ABC_DETECTIONS).expect("write detections");
}
