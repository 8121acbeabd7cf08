use std::collections::BTreeMap;

use crate::ocr::{BBoxPx, Detection};

struct WordToken {
    text: String,
    bbox: BBoxPx,
    conf: f32,
}

/// Groups word rows of `tesseract ... tsv` output into one detection per
/// text line, in tesseract's reading order.
pub(super) fn parse_tsv_lines(tsv: &str) -> Vec<Detection> {
    let mut word_map: BTreeMap<(i32, i32, i32, i32), Vec<WordToken>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let page_num: i32 = cols[1].parse().unwrap_or(0);
        let block_num: i32 = cols[2].parse().unwrap_or(0);
        let par_num: i32 = cols[3].parse().unwrap_or(0);
        let line_num: i32 = cols[4].parse().unwrap_or(0);
        let left: u32 = cols[6].parse().unwrap_or(0);
        let top: u32 = cols[7].parse().unwrap_or(0);
        let width: u32 = cols[8].parse().unwrap_or(0);
        let height: u32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (page_num, block_num, par_num, line_num);
        word_map.entry(key).or_default().push(WordToken {
            text: text.to_string(),
            bbox: BBoxPx {
                x: left,
                y: top,
                w: width,
                h: height,
            },
            conf,
        });
    }

    word_map
        .into_values()
        .filter_map(|mut words| {
            words.sort_by_key(|word| word.bbox.x);
            build_line(&words)
        })
        .collect()
}

fn build_line(words: &[WordToken]) -> Option<Detection> {
    let first = words.first()?;
    let bbox = words
        .iter()
        .skip(1)
        .fold(first.bbox.clone(), |acc, word| union_bbox(&acc, &word.bbox));
    let text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let conf = words.iter().map(|word| word.conf).sum::<f32>() / words.len() as f32;
    Some(Detection {
        bbox,
        text,
        conf: (conf / 100.0).clamp(0.0, 1.0),
    })
}

fn union_bbox(a: &BBoxPx, b: &BBoxPx) -> BBoxPx {
    let x1 = a.x.min(b.x);
    let y1 = a.y.min(b.y);
    let x2 = (a.x + a.w).max(b.x + b.w);
    let y2 = (a.y + a.h).max(b.y + b.h);
    BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    }
}
