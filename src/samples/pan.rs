// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The pan law.
//!
//! Nineteen discrete positions with a constant-power curve: position 0 is hard left,
//! [`PAN_CENTER`] is the center (both channels at -3 dB) and [`PAN_RIGHT`] is hard
//! right. The right gains are the left gains reversed.

/// Number of pan positions.
pub const PAN_POSITIONS: usize = 19;

/// The center position.
pub const PAN_CENTER: u8 = 9;

/// The hard right position.
pub const PAN_RIGHT: u8 = (PAN_POSITIONS - 1) as u8;

/// Per-channel gains indexed by `[channel][position]`, left channel first.
pub const PAN_TABLE: [[f32; PAN_POSITIONS]; 2] = [
    [
        1.000, 0.996, 0.985, 0.966, 0.940, 0.906, 0.866, 0.819, 0.766, 0.707, 0.643, 0.574,
        0.500, 0.423, 0.342, 0.259, 0.174, 0.087, 0.000,
    ],
    [
        0.000, 0.087, 0.174, 0.259, 0.342, 0.423, 0.500, 0.574, 0.643, 0.707, 0.766, 0.819,
        0.866, 0.906, 0.940, 0.966, 0.985, 0.996, 1.000,
    ],
];

/// Returns the (left, right) gains for a position. Positions past the hard right
/// position are treated as hard right.
#[inline]
pub fn gains(position: u8) -> (f32, f32) {
    let position = usize::from(position.min(PAN_RIGHT));
    (PAN_TABLE[0][position], PAN_TABLE[1][position])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetry() {
        for p in 0..PAN_POSITIONS {
            assert_eq!(PAN_TABLE[0][p], PAN_TABLE[1][PAN_POSITIONS - 1 - p]);
        }
    }

    #[test]
    fn test_endpoints_and_center() {
        assert_eq!(gains(0), (1.0, 0.0));
        assert_eq!(gains(PAN_RIGHT), (0.0, 1.0));
        assert_eq!(gains(PAN_CENTER), (0.707, 0.707));
        assert_eq!(gains(200), gains(PAN_RIGHT));
    }

    #[test]
    fn test_roughly_constant_power() {
        for p in 0..PAN_POSITIONS as u8 {
            let (l, r) = gains(p);
            let power = l * l + r * r;
            assert!((power - 1.0).abs() < 0.01, "position {} has power {}", p, power);
        }
    }

    #[test]
    fn test_monotonic() {
        for p in 1..PAN_POSITIONS {
            assert!(PAN_TABLE[0][p] < PAN_TABLE[0][p - 1]);
            assert!(PAN_TABLE[1][p] > PAN_TABLE[1][p - 1]);
        }
    }
}
