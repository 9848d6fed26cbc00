//! Presentation viewport and projection.

use glam::{Mat4, Vec3};
use postfx_core::{Size2D, Viewport};

/// How the frame is placed inside the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportPolicy {
    pub keep_aspect: bool,
    pub integer_scale: bool,
    /// Display aspect; frames without one use their own ratio.
    pub aspect_ratio: Option<f32>,
}

fn frame_aspect(frame: Size2D, policy: &ViewportPolicy) -> f32 {
    policy
        .aspect_ratio
        .filter(|a| *a > 0.0)
        .unwrap_or(frame.width.max(1) as f32 / frame.height.max(1) as f32)
}

/// Largest integer multiple of the frame that fits, centered.
fn integer_viewport(window: Size2D, frame: Size2D, aspect: f32, keep_aspect: bool) -> Viewport {
    let base_h = frame.height.max(1);
    let base_w = if keep_aspect {
        ((base_h as f32 * aspect).round() as u32).max(1)
    } else {
        frame.width.max(1)
    };
    let scale = (window.width / base_w).min(window.height / base_h).max(1);
    let width = base_w * scale;
    let height = base_h * scale;
    Viewport::new(
        (window.width as i32 - width as i32) / 2,
        (window.height as i32 - height as i32) / 2,
        width,
        height,
    )
}

/// Viewport in GL window coordinates (origin bottom-left).
pub fn compute_viewport(window: Size2D, frame: Size2D, policy: &ViewportPolicy) -> Viewport {
    let aspect = frame_aspect(frame, policy);
    if policy.integer_scale {
        return integer_viewport(window, frame, aspect, policy.keep_aspect);
    }
    let full = Viewport::new(0, 0, window.width, window.height);
    if !policy.keep_aspect {
        return full;
    }

    let device = window.width.max(1) as f32 / window.height.max(1) as f32;
    if (device - aspect).abs() < 0.0001 {
        full
    } else if device > aspect {
        let delta = (aspect / device - 1.0) / 2.0 + 0.5;
        let x = (window.width as f32 * (0.5 - delta)).round() as i32;
        let width = (2.0 * window.width as f32 * delta).round() as u32;
        Viewport::new(x, 0, width.max(1), window.height)
    } else {
        let delta = (device / aspect - 1.0) / 2.0 + 0.5;
        let y = (window.height as f32 * (0.5 - delta)).round() as i32;
        let height = (2.0 * window.height as f32 * delta).round() as u32;
        Viewport::new(0, y, window.width, height.max(1))
    }
}

/// MVP for the final pass: unit-square ortho, rotated by `rotation` quarter turns,
/// then flipped vertically so row 0 of the frame lands at the top.
pub fn final_pass_mvp(rotation: u32) -> [f32; 16] {
    let ortho = Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, -1.0, 1.0);
    let angle = std::f32::consts::FRAC_PI_2 * (rotation % 4) as f32;
    let rotated = Mat4::from_rotation_z(angle) * ortho;
    (Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * rotated).to_cols_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const KEEP: ViewportPolicy = ViewportPolicy {
        keep_aspect: true,
        integer_scale: false,
        aspect_ratio: None,
    };

    fn apply(mvp: [f32; 16], x: f32, y: f32) -> (f32, f32) {
        let p = Mat4::from_cols_array(&mvp) * Vec4::new(x, y, 0.0, 1.0);
        (p.x, p.y)
    }

    #[test]
    fn pillarboxes_a_4_3_frame_on_16_9() {
        let vp = compute_viewport(
            Size2D::new(1920, 1080),
            Size2D::new(320, 240),
            &KEEP,
        );
        assert_eq!(vp, Viewport::new(240, 0, 1440, 1080));
    }

    #[test]
    fn letterboxes_wide_frames() {
        let policy = ViewportPolicy {
            aspect_ratio: Some(2.0),
            ..KEEP
        };
        let vp = compute_viewport(Size2D::new(1000, 1000), Size2D::new(256, 224), &policy);
        assert_eq!(vp, Viewport::new(0, 250, 1000, 500));
    }

    #[test]
    fn stretch_fills_the_window() {
        let policy = ViewportPolicy {
            keep_aspect: false,
            ..KEEP
        };
        let vp = compute_viewport(Size2D::new(800, 600), Size2D::new(256, 240), &policy);
        assert_eq!(vp, Viewport::new(0, 0, 800, 600));
    }

    #[test]
    fn integer_scale_centers_largest_multiple() {
        let policy = ViewportPolicy {
            keep_aspect: false,
            integer_scale: true,
            aspect_ratio: None,
        };
        let vp = compute_viewport(Size2D::new(1920, 1080), Size2D::new(256, 240), &policy);
        assert_eq!(vp, Viewport::new(448, 60, 1024, 960));
    }

    #[test]
    fn unrotated_mvp_flips_y_over_the_unit_square() {
        let mvp = final_pass_mvp(0);
        let (x0, y0) = apply(mvp, 0.0, 0.0);
        let (x1, y1) = apply(mvp, 1.0, 1.0);
        assert!((x0 + 1.0).abs() < 1e-6 && (y0 - 1.0).abs() < 1e-6);
        assert!((x1 - 1.0).abs() < 1e-6 && (y1 + 1.0).abs() < 1e-6);
    }

    #[test]
    fn quarter_turn_rotates_before_the_flip() {
        let (x, y) = apply(final_pass_mvp(1), 1.0, 1.0);
        // ortho maps (1, 1) to (1, 1); rotating 90 degrees gives (-1, 1); flip gives (-1, -1).
        assert!((x + 1.0).abs() < 1e-5, "x = {x}");
        assert!((y + 1.0).abs() < 1e-5, "y = {y}");
        assert_eq!(final_pass_mvp(5), final_pass_mvp(1));
    }
}
