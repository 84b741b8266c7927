//! Movement, bounds clamping and distance helpers

use super::entities::MoveInput;

/// Rectangular play area with a footprint inset
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

/// Physics helpers for entity movement
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Unit direction for a set of directional flags.
    ///
    /// Opposing flags cancel out. Diagonals are normalised so they are no
    /// faster than straight movement.
    pub fn input_direction(input: &MoveInput) -> (f32, f32) {
        let mut dx = 0.0_f32;
        let mut dy = 0.0_f32;
        if input.left {
            dx -= 1.0;
        }
        if input.right {
            dx += 1.0;
        }
        if input.up {
            dy -= 1.0;
        }
        if input.down {
            dy += 1.0;
        }

        if dx != 0.0 && dy != 0.0 {
            let len = (dx * dx + dy * dy).sqrt();
            dx /= len;
            dy /= len;
        }
        (dx, dy)
    }

    /// Integrate a player's position for one step and clamp it into the world.
    /// Returns (new_x, new_y)
    pub fn move_player(
        x: f32,
        y: f32,
        input: &MoveInput,
        speed: f32,
        footprint: f32,
        bounds: Bounds,
        dt: f32,
    ) -> (f32, f32) {
        let (dir_x, dir_y) = Self::input_direction(input);
        let new_x = x + dir_x * speed * dt;
        let new_y = y + dir_y * speed * dt;

        let half = footprint / 2.0;
        (
            Self::clamp_axis(new_x, half, bounds.width),
            Self::clamp_axis(new_y, half, bounds.height),
        )
    }

    /// Clamp a coordinate to `[half, dimension - half]`
    pub fn clamp_axis(value: f32, half: f32, dimension: f32) -> f32 {
        // Footprints wider than the world pin to the centre instead of panicking in clamp
        if dimension - half < half {
            return dimension / 2.0;
        }
        value.clamp(half, dimension - half)
    }

    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x2 - x1;
        let dy = y2 - y1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move in a straight line toward a point, never past it.
    /// Returns (new_x, new_y)
    pub fn step_toward(x: f32, y: f32, target_x: f32, target_y: f32, max_step: f32) -> (f32, f32) {
        let dist = Self::distance(x, y, target_x, target_y);
        if dist <= max_step || dist < f32::EPSILON {
            return (target_x, target_y);
        }
        let scale = max_step / dist;
        (x + (target_x - x) * scale, y + (target_y - y) * scale)
    }

    /// Square neighbourhood test used for building density
    pub fn within_square(x1: f32, y1: f32, x2: f32, y2: f32, unit: f32) -> bool {
        (x2 - x1).abs() <= unit && (y2 - y1).abs() <= unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Bounds = Bounds {
        width: 800.0,
        height: 600.0,
    };

    fn all_inputs() -> Vec<MoveInput> {
        (0..16u8)
            .map(|bits| MoveInput {
                up: bits & 1 != 0,
                down: bits & 2 != 0,
                left: bits & 4 != 0,
                right: bits & 8 != 0,
            })
            .collect()
    }

    #[test]
    fn direction_is_unit_or_zero_for_every_input() {
        for input in all_inputs() {
            let (dx, dy) = PhysicsSystem::input_direction(&input);
            let len = (dx * dx + dy * dy).sqrt();
            assert!(
                len.abs() < 1e-6 || (len - 1.0).abs() < 1e-6,
                "input {:?} produced length {}",
                input,
                len
            );
        }
    }

    #[test]
    fn diagonal_covers_same_distance_as_straight() {
        let straight = MoveInput {
            right: true,
            ..Default::default()
        };
        let diagonal = MoveInput {
            right: true,
            down: true,
            ..Default::default()
        };
        let (sx, sy) = PhysicsSystem::move_player(400.0, 300.0, &straight, 100.0, 30.0, BOUNDS, 0.5);
        let (dx, dy) = PhysicsSystem::move_player(400.0, 300.0, &diagonal, 100.0, 30.0, BOUNDS, 0.5);
        let straight_dist = PhysicsSystem::distance(400.0, 300.0, sx, sy);
        let diagonal_dist = PhysicsSystem::distance(400.0, 300.0, dx, dy);
        assert!((straight_dist - 50.0).abs() < 1e-3);
        assert!((diagonal_dist - straight_dist).abs() < 1e-3);
    }

    #[test]
    fn opposing_flags_cancel() {
        let input = MoveInput {
            up: true,
            down: true,
            left: true,
            right: true,
        };
        assert_eq!(PhysicsSystem::input_direction(&input), (0.0, 0.0));
    }

    #[test]
    fn movement_is_clamped_to_bounds() {
        let input = MoveInput {
            up: true,
            left: true,
            ..Default::default()
        };
        let (x, y) = PhysicsSystem::move_player(20.0, 20.0, &input, 1000.0, 30.0, BOUNDS, 1.0);
        assert_eq!((x, y), (15.0, 15.0));

        let input = MoveInput {
            down: true,
            right: true,
            ..Default::default()
        };
        let (x, y) = PhysicsSystem::move_player(780.0, 580.0, &input, 1000.0, 30.0, BOUNDS, 1.0);
        assert_eq!((x, y), (785.0, 585.0));
    }

    #[test]
    fn step_toward_never_overshoots() {
        let (x, y) = PhysicsSystem::step_toward(0.0, 0.0, 3.0, 4.0, 10.0);
        assert_eq!((x, y), (3.0, 4.0));

        let (x, y) = PhysicsSystem::step_toward(0.0, 0.0, 30.0, 40.0, 5.0);
        assert!((x - 3.0).abs() < 1e-5);
        assert!((y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn square_neighbourhood_is_inclusive() {
        assert!(PhysicsSystem::within_square(0.0, 0.0, 40.0, -40.0, 40.0));
        assert!(!PhysicsSystem::within_square(0.0, 0.0, 40.5, 0.0, 40.0));
    }
}
