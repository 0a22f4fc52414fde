//! Idle/walk/run/jump selection with cross-fading, shared by the local
//! avatar and every remote avatar

/// Cross-fade duration between clips (seconds)
pub const CROSS_FADE_SECS: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationClip {
    Idle,
    Walk,
    Run,
    Jump,
}

impl AnimationClip {
    /// Jumping wins over everything, then running, then walking
    pub fn select(is_moving: bool, is_running: bool, is_jumping: bool) -> Self {
        if is_jumping {
            Self::Jump
        } else if is_moving && is_running {
            Self::Run
        } else if is_moving {
            Self::Walk
        } else {
            Self::Idle
        }
    }
}

/// Blend weights handed to the renderer. Weights sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationWeights {
    pub current: AnimationClip,
    pub previous: Option<AnimationClip>,
    /// Weight of `current`; `previous` gets the remainder
    pub blend: f32,
}

#[derive(Debug, Clone)]
pub struct AnimationBlender {
    current: AnimationClip,
    previous: Option<AnimationClip>,
    fade_elapsed: f32,
}

impl Default for AnimationBlender {
    fn default() -> Self {
        Self {
            current: AnimationClip::Idle,
            previous: None,
            fade_elapsed: CROSS_FADE_SECS,
        }
    }
}

impl AnimationBlender {
    pub fn update(
        &mut self,
        is_moving: bool,
        is_running: bool,
        is_jumping: bool,
        dt: f32,
    ) -> AnimationWeights {
        let wanted = AnimationClip::select(is_moving, is_running, is_jumping);

        if wanted != self.current {
            self.previous = Some(self.current);
            self.current = wanted;
            self.fade_elapsed = 0.0;
        } else {
            self.fade_elapsed = (self.fade_elapsed + dt.max(0.0)).min(CROSS_FADE_SECS);
        }

        if self.fade_elapsed >= CROSS_FADE_SECS {
            self.previous = None;
        }

        self.weights()
    }

    pub fn weights(&self) -> AnimationWeights {
        AnimationWeights {
            current: self.current,
            previous: self.previous,
            blend: match self.previous {
                Some(_) => self.fade_elapsed / CROSS_FADE_SECS,
                None => 1.0,
            },
        }
    }

    pub fn current(&self) -> AnimationClip {
        self.current
    }
}
