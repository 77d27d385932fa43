//! Path-description mini-language used by drawing items.
//!
//! `M x y` starts a sub-path, `L x y` appends a line segment. Coordinates
//! are canvas-space floats separated by whitespace and/or a comma. As in
//! SVG, extra coordinate pairs after a command repeat it as `L`.
//!
//! Built on `winnow` 0.7, like the document parser it grew from.

use crate::error::{CanvasError, CanvasResult};
use crate::geometry::Point;
use std::fmt::Write as _;
use winnow::ascii::float;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

/// One continuous run of points between `M` commands.
pub type SubPath = Vec<Point>;

/// Parse a path string into its sub-paths.
///
/// # Errors
/// Returns [`CanvasError::InvalidPath`] on unknown commands, `L` before any
/// `M`, missing or non-finite coordinates.
pub fn parse_path(input: &str) -> CanvasResult<Vec<SubPath>> {
    let mut rest = input;
    let mut subpaths: Vec<SubPath> = Vec::new();

    skip_separators(&mut rest);
    while !rest.is_empty() {
        let cmd_offset = input.len() - rest.len();
        let cmd = one_of::<_, _, ContextError>(['M', 'L'])
            .parse_next(&mut rest)
            .map_err(|_| invalid(cmd_offset, "expected `M` or `L`"))?;
        skip_separators(&mut rest);

        let mut first = true;
        loop {
            let offset = input.len() - rest.len();
            if !first && !starts_number(rest) {
                break;
            }
            let point = parse_point(&mut rest).map_err(|_| invalid(offset, "expected `x y`"))?;
            if !point.is_finite() {
                return Err(invalid(offset, "coordinate is not finite"));
            }
            match (cmd, first) {
                ('M', true) => subpaths.push(vec![point]),
                _ => match subpaths.last_mut() {
                    Some(current) => current.push(point),
                    None => return Err(invalid(cmd_offset, "`L` before any `M`")),
                },
            }
            first = false;
            skip_separators(&mut rest);
        }
    }

    Ok(subpaths)
}

/// Parse a path and flatten every sub-path into one point list.
pub fn parse_points(input: &str) -> CanvasResult<Vec<Point>> {
    Ok(parse_path(input)?.into_iter().flatten().collect())
}

/// Serialize one stroke as `M x0 y0 L x1 y1 …`.
pub fn emit_path(points: &[Point]) -> String {
    let mut out = String::new();
    write_subpath(&mut out, points);
    out
}

/// Serialize several sub-paths, each starting with `M`.
pub fn emit_subpaths(subpaths: &[SubPath]) -> String {
    let mut out = String::new();
    for sub in subpaths {
        write_subpath(&mut out, sub);
    }
    out
}

fn write_subpath(out: &mut String, points: &[Point]) {
    for (i, p) in points.iter().enumerate() {
        if !out.is_empty() {
            out.push(' ');
        }
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(out, "{cmd} {} {}", p.x, p.y);
    }
}

/// Shift every coordinate of `path` by `(dx, dy)`.
pub fn translate_path(path: &str, dx: f64, dy: f64) -> CanvasResult<String> {
    map_points(path, |p| Point::new(p.x + dx, p.y + dy))
}

/// Scale every coordinate of `path` about `origin`.
pub fn scale_path(path: &str, origin: Point, sx: f64, sy: f64) -> CanvasResult<String> {
    map_points(path, |p| {
        Point::new(origin.x + (p.x - origin.x) * sx, origin.y + (p.y - origin.y) * sy)
    })
}

fn map_points(path: &str, f: impl Fn(Point) -> Point) -> CanvasResult<String> {
    let subpaths: Vec<SubPath> = parse_path(path)?
        .into_iter()
        .map(|sub| sub.into_iter().map(&f).collect())
        .collect();
    Ok(emit_subpaths(&subpaths))
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn invalid(offset: usize, reason: &str) -> CanvasError {
    CanvasError::InvalidPath {
        offset,
        reason: reason.to_string(),
    }
}

fn skip_separators(input: &mut &str) {
    let _: Result<&str, ErrMode<ContextError>> =
        take_while(0.., |c: char| c.is_whitespace() || c == ',').parse_next(input);
}

fn starts_number(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
}

fn parse_coordinate(input: &mut &str) -> ModalResult<f64> {
    // `float` also accepts `inf`/`nan` spellings; only digits may start a coordinate.
    if !starts_number(input) {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    float.parse_next(input)
}

fn parse_point(input: &mut &str) -> ModalResult<Point> {
    let x = parse_coordinate(input)?;
    skip_separators(input);
    let y = parse_coordinate(input)?;
    Ok(Point::new(x, y))
}
