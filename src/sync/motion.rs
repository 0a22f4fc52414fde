//! Local motion sampling

use glam::Vec3;

/// Horizontal speed below which the avatar keeps its previous facing
const FACING_SPEED_THRESHOLD: f32 = 0.05;

/// The local avatar's physics body, owned by the physics engine
pub trait PhysicsBody {
    /// World translation, `None` until the body exists
    fn translation(&self) -> Option<Vec3>;
    fn linear_velocity(&self) -> Vec3;
}

/// Input-derived movement intent for the current tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
    pub jump: bool,
}

impl MotionInput {
    pub fn is_moving(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }

    pub fn is_running(&self) -> bool {
        self.is_moving() && self.run
    }
}

/// One tick's view of the local avatar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMotionSample {
    pub position: Vec3,
    pub rotation_y: f32,
    pub is_moving: bool,
    pub is_running: bool,
}

/// Reads the local body once per tick.
///
/// Facing follows horizontal velocity; when the avatar is (nearly) still the
/// last facing is kept so idle players do not snap back to zero.
#[derive(Debug, Default)]
pub struct MotionSampler {
    facing: f32,
}

impl MotionSampler {
    pub fn new(initial_facing: f32) -> Self {
        Self {
            facing: initial_facing,
        }
    }

    pub fn sample(&mut self, body: &impl PhysicsBody, input: MotionInput) -> Option<LocalMotionSample> {
        let position = body.translation()?;
        let velocity = body.linear_velocity();

        if velocity.x.hypot(velocity.z) > FACING_SPEED_THRESHOLD {
            self.facing = velocity.x.atan2(velocity.z);
        }

        Some(LocalMotionSample {
            position,
            rotation_y: self.facing,
            is_moving: input.is_moving(),
            is_running: input.is_running(),
        })
    }

    pub fn facing(&self) -> f32 {
        self.facing
    }
}
