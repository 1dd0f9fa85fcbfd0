//! Overlay placement.
//!
//! The x/y expressions are evaluated once, as soon as both stream
//! dimensions are known, and the result is fixed for the stage lifetime.

use vidlay_common::error::{VidlayError, VidlayResult};

use crate::expr::Expr;

/// Variables available to position expressions, in binding order.
pub const POSITION_VARIABLES: [&str; 4] = ["main_w", "main_h", "overlay_w", "overlay_h"];

/// Top-left corner of the overlay in base-frame pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayPosition {
    pub x: i32,
    pub y: i32,
}

impl OverlayPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Evaluate the offset expressions against the two streams' dimensions.
///
/// Results are truncated toward zero. Malformed expressions, unknown
/// variables and non-finite results are configuration errors naming the
/// offending expression.
pub fn resolve_position(
    expr_x: &str,
    expr_y: &str,
    main_w: u32,
    main_h: u32,
    overlay_w: u32,
    overlay_h: u32,
) -> VidlayResult<OverlayPosition> {
    let values = [
        main_w as f64,
        main_h as f64,
        overlay_w as f64,
        overlay_h as f64,
    ];

    let x = eval_offset(expr_x, &values)?;
    let y = eval_offset(expr_y, &values)?;

    tracing::info!(
        x,
        y,
        expr_x,
        expr_y,
        main_w,
        main_h,
        overlay_w,
        overlay_h,
        "Resolved overlay position"
    );
    Ok(OverlayPosition { x, y })
}

fn eval_offset(text: &str, values: &[f64]) -> VidlayResult<i32> {
    let value = Expr::parse(text, &POSITION_VARIABLES)?.eval(values);
    if !value.is_finite() {
        return Err(VidlayError::expression(
            text,
            format!("result {value} is not a finite number"),
        ));
    }
    Ok(value.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}
