//! Shader program lookup keyed by a structural configuration descriptor.

use std::collections::BTreeMap;

/// The structural key a program is compiled for. Every flag combination maps
/// to one program variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramConfig {
    pub instancing: bool,
    pub use_object_colors: bool,
    pub quantize_normals: bool,
    pub quantize_vertices: bool,
}

/// Attribute locations of one program variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramInfo {
    pub position_location: u32,
    pub normal_location: u32,
    pub color_location: u32,
}

/// Resolves a program descriptor to its attribute locations.
///
/// Must be deterministic and side-effect-free: identical descriptors always
/// resolve to the same locations within one registry.
pub trait ProgramRegistry {
    fn get_program(&self, config: ProgramConfig) -> ProgramInfo;
}

/// Registry precomputing every flag combination.
///
/// All variants share the standard location assignment (position 0, normal 1,
/// color 2); instancing variants place their per-instance streams above
/// these, so geometry locations stay stable across configs.
#[derive(Debug, Clone)]
pub struct ProgramTable {
    programs: BTreeMap<ProgramConfig, ProgramInfo>,
}

impl ProgramTable {
    pub fn new() -> Self {
        let mut programs = BTreeMap::new();
        for bits in 0..16u8 {
            let config = ProgramConfig {
                instancing: bits & 1 != 0,
                use_object_colors: bits & 2 != 0,
                quantize_normals: bits & 4 != 0,
                quantize_vertices: bits & 8 != 0,
            };
            programs.insert(
                config,
                ProgramInfo {
                    position_location: 0,
                    normal_location: 1,
                    color_location: 2,
                },
            );
        }
        Self { programs }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl Default for ProgramTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramRegistry for ProgramTable {
    fn get_program(&self, config: ProgramConfig) -> ProgramInfo {
        self.programs[&config]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_config_resolves() {
        let table = ProgramTable::new();
        assert_eq!(table.len(), 16);
        for bits in 0..16u8 {
            let config = ProgramConfig {
                instancing: bits & 1 != 0,
                use_object_colors: bits & 2 != 0,
                quantize_normals: bits & 4 != 0,
                quantize_vertices: bits & 8 != 0,
            };
            let info = table.get_program(config);
            assert_eq!(info.position_location, 0);
            assert_eq!(info.normal_location, 1);
            assert_eq!(info.color_location, 2);
        }
    }

    #[test]
    fn identical_configs_resolve_identically() {
        let table = ProgramTable::new();
        let config = ProgramConfig {
            instancing: false,
            use_object_colors: false,
            quantize_normals: true,
            quantize_vertices: true,
        };
        assert_eq!(table.get_program(config), table.get_program(config));
    }
}
