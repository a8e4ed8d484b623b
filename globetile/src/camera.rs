//! Read-only camera/view state consumed by the level evaluators and
//! visibility tests.

use glam::{DMat4, DVec3, DVec4};

/// Camera position plus the globe's model transform, captured once per
/// frame. Evaluations happen in the globe's model space, so the inverse
/// transform is computed up front.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    camera_position: DVec3,
    model_transform: DMat4,
    inverse_model_transform: DMat4,
}

impl RenderView {
    pub fn new(camera_position: DVec3, model_transform: DMat4) -> Self {
        Self {
            camera_position,
            model_transform,
            inverse_model_transform: model_transform.inverse(),
        }
    }

    /// Camera position in world space.
    pub fn camera_position(&self) -> DVec3 {
        self.camera_position
    }

    pub fn model_transform(&self) -> DMat4 {
        self.model_transform
    }

    pub fn inverse_model_transform(&self) -> DMat4 {
        self.inverse_model_transform
    }

    /// Camera position in the globe's reference frame.
    pub fn camera_position_model_space(&self) -> DVec3 {
        (self.inverse_model_transform * DVec4::from((self.camera_position, 1.0))).truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform_passes_position_through() {
        let view = RenderView::new(DVec3::new(1.0, 2.0, 3.0), DMat4::IDENTITY);
        assert_eq!(view.camera_position_model_space(), DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_translated_globe_shifts_model_space_position() {
        let model = DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0));
        let view = RenderView::new(DVec3::new(11.0, 0.0, 0.0), model);
        let model_space = view.camera_position_model_space();
        assert!((model_space - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-12);
    }
}
