/// How long a camera reset request stays pending after a mode switch.
pub const CAMERA_RESET_HOLD_SECS: f32 = 0.1;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Overview,
    Detail {
        building_id: String,
    },
}

impl ViewMode {
    pub fn is_detail(&self) -> bool {
        matches!(self, Self::Detail { .. })
    }

    pub fn building_id(&self) -> Option<&str> {
        match self {
            Self::Detail { building_id } => Some(building_id.as_str()),
            Self::Overview => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CameraResetRequest {
    remaining: f32,
    consumed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ViewModeCoordinator {
    mode: ViewMode,
    camera_reset: Option<CameraResetRequest>,
}

impl ViewModeCoordinator {
    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    /// Switches mode and raises a camera reset. Returns false when already in
    /// `mode`.
    pub fn switch_to(&mut self, mode: ViewMode) -> bool {
        if self.mode == mode {
            return false;
        }
        log::info!("view mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.camera_reset = Some(CameraResetRequest {
            remaining: CAMERA_RESET_HOLD_SECS,
            consumed: false,
        });
        true
    }

    pub fn camera_reset_pending(&self) -> bool {
        self.camera_reset.is_some()
    }

    /// True at most once per mode switch.
    pub fn take_camera_reset(&mut self) -> bool {
        match self.camera_reset.as_mut() {
            Some(request) if !request.consumed => {
                request.consumed = true;
                true
            }
            _ => false,
        }
    }

    pub fn advance(&mut self, delta_secs: f32) {
        if let Some(request) = self.camera_reset.as_mut() {
            request.remaining -= delta_secs;
            if request.remaining <= 0.0 {
                self.camera_reset = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_reset_is_consumed_once_and_expires() {
        let mut coordinator = ViewModeCoordinator::default();
        assert!(!coordinator.switch_to(ViewMode::Overview));
        assert!(coordinator.switch_to(ViewMode::Detail {
            building_id: "7".to_string()
        }));
        assert!(coordinator.take_camera_reset());
        assert!(!coordinator.take_camera_reset());
        assert!(coordinator.camera_reset_pending());
        coordinator.advance(0.05);
        assert!(coordinator.camera_reset_pending());
        coordinator.advance(0.06);
        assert!(!coordinator.camera_reset_pending());
    }

    #[test]
    fn switching_between_buildings_raises_new_reset() {
        let mut coordinator = ViewModeCoordinator::default();
        coordinator.switch_to(ViewMode::Detail {
            building_id: "3".to_string(),
        });
        assert!(coordinator.take_camera_reset());
        assert!(coordinator.switch_to(ViewMode::Detail {
            building_id: "5".to_string()
        }));
        assert!(coordinator.take_camera_reset());
        assert_eq!(coordinator.mode().building_id(), Some("5"));
    }
}
