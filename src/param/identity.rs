//! Derived-surface identity helpers
//!
//! Every derived surface id is a deterministic hash of its parent param id
//! plus derivation kind and parameters, so re-deriving the same inputs always
//! yields the same id.

use serde_json::json;

use crate::core::identity::derived_id;

/// Wall side for surface derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    A,
    B,
}

impl WallSide {
    fn as_str(self) -> &'static str {
        match self {
            WallSide::A => "A",
            WallSide::B => "B",
        }
    }
}

/// Id of the derived surface for one side of a wall.
pub fn surface_id_for_wall_side(wall_id: &str, side: WallSide) -> String {
    derived_id(wall_id, "surface.wall.side", &json!({"side": side.as_str()}))
}

/// Id of the derived floor surface of a room.
pub fn surface_id_for_floor(room_id: &str) -> String {
    derived_id(room_id, "surface.floor", &json!({}))
}

/// Id of the derived ceiling surface of a room.
pub fn surface_id_for_ceiling(room_id: &str) -> String {
    derived_id(room_id, "surface.ceiling", &json!({}))
}

/// Id of the derived surface of a shared wall.
pub fn surface_id_for_shared_wall(shared_wall_id: &str) -> String {
    derived_id(shared_wall_id, "surface.shared_wall", &json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_side_ids_differ() {
        let a = surface_id_for_wall_side("w01", WallSide::A);
        let b = surface_id_for_wall_side("w01", WallSide::B);
        assert_ne!(a, b);
        assert!(a.starts_with("w01:surface.wall.side:"));
    }

    #[test]
    fn test_ids_are_deterministic() {
        assert_eq!(surface_id_for_floor("r1"), surface_id_for_floor("r1"));
        assert_eq!(surface_id_for_ceiling("r1"), surface_id_for_ceiling("r1"));
        assert_ne!(surface_id_for_floor("r1"), surface_id_for_ceiling("r1"));
    }

    #[test]
    fn test_shared_wall_id_prefix() {
        let id = surface_id_for_shared_wall("sw1");
        assert!(id.starts_with("sw1:surface.shared_wall:"));
    }
}
