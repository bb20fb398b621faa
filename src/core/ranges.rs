use super::error::{SplitError, SplitResult};

/// Parses a page range specification like "2-4,7" into 1-based inclusive
/// `(start, end)` pairs.
///
/// Comma-separated parts are either a single page number (`7` becomes
/// `(7, 7)`) or a dash-separated pair (`2-4`). Bounds checking against the
/// actual page count happens at split time, not here. Error offsets point
/// into the specification string.
pub fn parse_ranges(spec: &str) -> SplitResult<Vec<(usize, usize)>> {
    let mut ranges = Vec::new();
    let mut offset = 0usize;

    for part in spec.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            return Err(SplitError::MalformedSyntax {
                offset,
                message: "empty page range".to_string(),
            });
        }

        let parsed = match trimmed.split_once('-') {
            Some((start, end)) => start
                .trim()
                .parse::<usize>()
                .ok()
                .zip(end.trim().parse::<usize>().ok()),
            None => trimmed.parse::<usize>().ok().map(|page| (page, page)),
        };

        match parsed {
            Some(range) => ranges.push(range),
            None => {
                return Err(SplitError::MalformedSyntax {
                    offset,
                    message: format!("invalid page range '{}'", trimmed),
                })
            }
        }

        offset += part.len() + 1;
    }

    Ok(ranges)
}
