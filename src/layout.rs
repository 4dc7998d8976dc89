//! Composite layout engine
//!
//! Pure geometry plus filter-graph synthesis for N video inputs on one
//! output canvas. Everything here is a deterministic function of its
//! arguments: for a fixed input count and canvas the rendered expression is
//! byte-identical across calls, which the coordinator relies on for
//! idempotence.

/// Grid geometry for a participant count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    /// Number of columns
    pub columns: u32,
    /// Number of rows
    pub rows: u32,
    /// Cell width in pixels
    pub cell_width: u32,
    /// Cell height in pixels
    pub cell_height: u32,
}

impl Grid {
    /// Compute the grid for `n` inputs on a canvas
    ///
    /// One input fills the frame; otherwise columns = ceil(sqrt(n)) and
    /// rows = ceil(n / columns), which yields halves for 2 and quadrants
    /// for 3..4. Cell dimensions floor-divide the canvas, so up to
    /// `columns - 1` / `rows - 1` pixels of canvas go unused.
    pub fn for_inputs(n: u32, canvas_width: u32, canvas_height: u32) -> Self {
        if n <= 1 {
            return Self {
                columns: 1,
                rows: 1,
                cell_width: canvas_width,
                cell_height: canvas_height,
            };
        }

        let columns = (n as f64).sqrt().ceil() as u32;
        let rows = n.div_ceil(columns);

        Self {
            columns,
            rows,
            cell_width: canvas_width / columns,
            cell_height: canvas_height / rows,
        }
    }
}

/// Scale an input to fit a box preserving aspect ratio, then pad to the
/// exact box size, centered
fn scale_pad(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height
    )
}

/// Build the filter-graph expression for `n_video` inputs
///
/// Inputs are referenced as `[0:v]..[n-1:v]` (the argv builder places video
/// inputs first). Every input is frame-rate normalized before any geometry,
/// so downstream stacking never sees variable source rates. The terminal
/// combined label is always `[v]`.
pub fn filter_graph(n_video: u32, canvas_width: u32, canvas_height: u32, fps: u32) -> String {
    assert!(n_video >= 1, "filter graph needs at least one video input");

    if n_video == 1 {
        return format!(
            "[0:v]fps={},{}[v]",
            fps,
            scale_pad(canvas_width, canvas_height)
        );
    }

    let grid = Grid::for_inputs(n_video, canvas_width, canvas_height);
    let mut parts: Vec<String> = Vec::new();

    for i in 0..n_video {
        parts.push(format!(
            "[{i}:v]fps={},{}[cell{i}]",
            fps,
            scale_pad(grid.cell_width, grid.cell_height),
            i = i
        ));
    }

    // One label per row: hstack full rows, pass a lone trailing cell through
    let mut row_labels: Vec<String> = Vec::new();
    let single_row = grid.rows == 1;

    for row in 0..grid.rows {
        let first = row * grid.columns;
        let last = ((row + 1) * grid.columns).min(n_video);
        let cells: Vec<String> = (first..last).map(|i| format!("[cell{}]", i)).collect();

        if cells.len() == 1 {
            row_labels.push(cells[0].clone());
        } else {
            let label = if single_row {
                "[v]".to_string()
            } else {
                format!("[row{}]", row)
            };
            parts.push(format!(
                "{}hstack=inputs={}{}",
                cells.join(""),
                cells.len(),
                label
            ));
            row_labels.push(label);
        }
    }

    if !single_row {
        parts.push(format!(
            "{}vstack=inputs={}[v]",
            row_labels.join(""),
            row_labels.len()
        ));
    }

    parts.join(";")
}
