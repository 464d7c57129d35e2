//! Per-instrument IK rig handlers
//!
//! Targets are expressed relative to the avatar body. A handler only moves
//! while its rig is the one rendered at full weight.

use super::smoothing::smooth_damp;
use super::RigVisualState;
use crate::config::{DrumRigConfig, GuitarRigConfig, KeyboardRigConfig, RigConfig};
use crate::instrument::{ContinuousParams, HandSide, InstrumentMode};
use crate::pose::IkTarget;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::trace;

/// Both hands slide along the keyboard; a key press rolls the wrist
#[derive(Debug, Clone)]
pub struct KeyboardRig {
    config: KeyboardRigConfig,
    targets: [IkTarget; 2],
    velocity: [Vector3<f32>; 2],
    pressed: [bool; 2],
}

impl KeyboardRig {
    pub fn new(config: KeyboardRigConfig) -> Self {
        let targets = [
            IkTarget::new(Point3::from(config.left_start), UnitQuaternion::identity()),
            IkTarget::new(Point3::from(config.right_start), UnitQuaternion::identity()),
        ];
        Self {
            config,
            targets,
            velocity: [Vector3::zeros(); 2],
            pressed: [false; 2],
        }
    }

    pub fn set_pressed(&mut self, side: HandSide, pressed: bool) {
        self.pressed[side.slot()] = pressed;
    }

    /// Where each hand is heading for the given keyboard positions
    pub fn goals(&self, params: &ContinuousParams) -> [Point3<f32>; 2] {
        let travel = self.config.axis() * self.config.spread;
        [
            Point3::from(self.config.left_start) - travel * params.keyboard_left,
            Point3::from(self.config.right_start) + travel * params.keyboard_right,
        ]
    }

    pub fn update(&mut self, dt: f32, params: &ContinuousParams) {
        let goals = self.goals(params);
        let press = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -self.config.press_angle.to_radians());

        for side in HandSide::BOTH {
            let i = side.slot();
            self.targets[i].position = smooth_damp(
                self.targets[i].position,
                goals[i],
                &mut self.velocity[i],
                self.config.movement_time,
                dt,
            );
            self.targets[i].rotation = if self.pressed[i] { press } else { UnitQuaternion::identity() };
        }
    }

    pub fn targets(&self) -> [IkTarget; 2] {
        self.targets
    }
}

/// Each hit drops the corresponding stick hand
#[derive(Debug, Clone)]
pub struct DrumRig {
    config: DrumRigConfig,
    targets: [IkTarget; 2],
    hit: [bool; 2],
}

impl DrumRig {
    pub fn new(config: DrumRigConfig) -> Self {
        let mut rig = Self {
            config,
            targets: [IkTarget::default(); 2],
            hit: [false; 2],
        };
        rig.update();
        rig
    }

    pub fn set_hit(&mut self, side: HandSide, hit: bool) {
        self.hit[side.slot()] = hit;
    }

    pub fn update(&mut self) {
        let starts = [self.config.left_start, self.config.right_start];
        for (i, start) in starts.iter().enumerate() {
            let mut position = Point3::from(*start);
            if self.hit[i] {
                position.y -= self.config.hit_depth;
            }
            self.targets[i] = IkTarget::new(position, UnitQuaternion::identity());
        }
    }

    pub fn targets(&self) -> [IkTarget; 2] {
        self.targets
    }
}

/// Left hand frets along the neck, right hand strums
#[derive(Debug, Clone)]
pub struct GuitarRig {
    config: GuitarRigConfig,
    fret: IkTarget,
    strum: IkTarget,
    velocity: Vector3<f32>,
    strumming: bool,
}

impl GuitarRig {
    pub fn new(config: GuitarRigConfig) -> Self {
        let fret = IkTarget::new(Point3::from(config.neck_start), UnitQuaternion::identity());
        let strum = IkTarget::new(Point3::from(config.strum_hand), UnitQuaternion::identity());
        Self {
            config,
            fret,
            strum,
            velocity: Vector3::zeros(),
            strumming: false,
        }
    }

    pub fn set_strumming(&mut self, strumming: bool) {
        self.strumming = strumming;
    }

    pub fn neck_goal(&self, neck: f32) -> Point3<f32> {
        Point3::from(self.config.neck_start).lerp(&Point3::from(self.config.neck_end), neck)
    }

    pub fn update(&mut self, dt: f32, params: &ContinuousParams) {
        let goal = self.neck_goal(params.guitar_neck);
        self.fret.position = smooth_damp(
            self.fret.position,
            goal,
            &mut self.velocity,
            self.config.movement_time,
            dt,
        );

        self.strum.position = Point3::from(self.config.strum_hand);
        self.strum.rotation = if self.strumming {
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.config.strum_angle.to_radians())
        } else {
            UnitQuaternion::identity()
        };
    }

    /// Left (fretting) and right (strumming) hand targets
    pub fn targets(&self) -> [IkTarget; 2] {
        [self.fret, self.strum]
    }
}

/// All instrument handlers of one participant plus the last discrete state received
#[derive(Debug, Clone)]
pub struct RigHandlers {
    keyboard: KeyboardRig,
    drum: DrumRig,
    guitar: GuitarRig,
    continuous: ContinuousParams,
    last_hit: [bool; 2],
    last_strum: bool,
}

impl RigHandlers {
    pub fn new(config: &RigConfig) -> Self {
        Self {
            keyboard: KeyboardRig::new(config.keyboard.clone()),
            drum: DrumRig::new(config.drum.clone()),
            guitar: GuitarRig::new(config.guitar.clone()),
            continuous: ContinuousParams::default(),
            last_hit: [false; 2],
            last_strum: false,
        }
    }

    /// Route a hit to the handler of `mode`
    ///
    /// The state is always recorded; modes without hit animation ignore it.
    pub fn apply_hit(&mut self, mode: InstrumentMode, side: HandSide, state: bool) {
        self.last_hit[side.slot()] = state;
        match mode {
            InstrumentMode::Keyboard => self.keyboard.set_pressed(side, state),
            InstrumentMode::Drum => self.drum.set_hit(side, state),
            InstrumentMode::Hands | InstrumentMode::Guitar => {
                trace!("Hit {:?}={} recorded, {} rig does not render it", side, state, mode);
            }
        }
    }

    /// Route a strum to the guitar handler when `mode` is Guitar
    pub fn apply_strum(&mut self, mode: InstrumentMode, state: bool) {
        self.last_strum = state;
        match mode {
            InstrumentMode::Guitar => self.guitar.set_strumming(state),
            InstrumentMode::Hands | InstrumentMode::Keyboard | InstrumentMode::Drum => {
                trace!("Strum={} recorded, {} rig does not render it", state, mode);
            }
        }
    }

    pub fn set_continuous(&mut self, params: ContinuousParams) {
        self.continuous = params;
    }

    pub fn continuous(&self) -> ContinuousParams {
        self.continuous
    }

    pub fn last_hit(&self, side: HandSide) -> bool {
        self.last_hit[side.slot()]
    }

    pub fn last_strum(&self) -> bool {
        self.last_strum
    }

    /// Animate the handler of the rig rendered at full weight
    pub fn update(&mut self, dt: f32, visual: &RigVisualState) {
        if !visual.instrument_rigs_enabled() {
            return;
        }
        match visual.active_rig() {
            InstrumentMode::Hands => {}
            InstrumentMode::Keyboard => self.keyboard.update(dt, &self.continuous),
            InstrumentMode::Drum => self.drum.update(),
            InstrumentMode::Guitar => self.guitar.update(dt, &self.continuous),
        }
    }

    /// Current left/right IK targets of the handler for `mode`
    pub fn targets(&self, mode: InstrumentMode) -> Option<[IkTarget; 2]> {
        match mode {
            InstrumentMode::Hands => None,
            InstrumentMode::Keyboard => Some(self.keyboard.targets()),
            InstrumentMode::Drum => Some(self.drum.targets()),
            InstrumentMode::Guitar => Some(self.guitar.targets()),
        }
    }

    /// Swap in new geometry; transient animation state is reset
    pub fn reconfigure(&mut self, config: &RigConfig) {
        let continuous = self.continuous;
        let (last_hit, last_strum) = (self.last_hit, self.last_strum);
        *self = Self::new(config);
        self.continuous = continuous;
        self.last_hit = last_hit;
        self.last_strum = last_strum;
    }
}
