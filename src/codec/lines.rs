use std::fmt::Write;

use glam::Vec3;

use crate::codec::FormatError;
use crate::record::{AnchorRecord, Payload, PrefabRef};

const LINES_PER_RECORD: usize = 3;

pub fn encode_lines(records: &[AnchorRecord], precision: usize) -> Result<String, FormatError> {
    let mut out = String::new();

    for (record, anchor) in records.iter().enumerate() {
        let payload = anchor.payload.as_str();

        if payload.contains(&['\n', '\r'][..]) {
            return Err(FormatError::MultilinePayload { record });
        }

        let Vec3 { x, y, z } = anchor.scale;

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{payload}");
        let _ = writeln!(out, "{}", anchor.prefab.index());
        let _ = writeln!(out, "{x:.precision$},{y:.precision$},{z:.precision$}");
    }

    Ok(out)
}

pub fn decode_lines(text: &str) -> Result<Vec<AnchorRecord>, FormatError> {
    let mut lines: Vec<&str> = text.lines().collect();

    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let mut records = Vec::with_capacity(lines.len() / LINES_PER_RECORD);

    for (record, chunk) in lines.chunks(LINES_PER_RECORD).enumerate() {
        let first_line = record * LINES_PER_RECORD + 1;

        let [payload, prefab, scale] = chunk else {
            let expected = if chunk.len() == 1 {
                "prefab index"
            } else {
                "scale"
            };

            return Err(FormatError::Truncated {
                line: first_line + chunk.len(),
                expected,
            });
        };

        if payload.is_empty() {
            return Err(FormatError::EmptyPayload { record });
        }

        let prefab = prefab
            .trim()
            .parse::<usize>()
            .map(PrefabRef::new)
            .map_err(|_| FormatError::PrefabIndex {
                line: first_line + 1,
                value: (*prefab).to_owned(),
            })?;

        let scale = parse_scale(scale).ok_or_else(|| FormatError::Scale {
            line: first_line + 2,
            value: (*scale).to_owned(),
        })?;

        records.push(AnchorRecord::new(Payload::new(*payload), prefab, scale));
    }

    Ok(records)
}

/// Accepts both `x,y,z` and `(x, y, z)`.
pub fn parse_scale(text: &str) -> Option<Vec3> {
    let text = text.trim();
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);

    let mut components = text.split(',').map(|c| c.trim().parse::<f32>());

    let x = components.next()?.ok()?;
    let y = components.next()?.ok()?;
    let z = components.next()?.ok()?;

    if components.next().is_some() {
        return None;
    }

    let scale = Vec3::new(x, y, z);
    scale.is_finite().then_some(scale)
}
