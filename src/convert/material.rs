use crate::record::MaterialRecord;

use super::types::{Material, MaterialColorPolicy};

/// One scene material per record, in record order.
pub(super) fn build_materials(
    records: &[MaterialRecord],
    policy: MaterialColorPolicy,
) -> Vec<Material> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| Material {
            name: record.name.clone(),
            color: placeholder_color(policy, index, &record.name),
        })
        .collect()
}

/// Opaque display color for a material without shading data.
pub fn placeholder_color(policy: MaterialColorPolicy, index: usize, name: &str) -> [f32; 4] {
    match policy {
        MaterialColorPolicy::Fixed(color) => color,
        MaterialColorPolicy::Seeded { seed } => {
            let mut state = seed ^ fnv1a(name.as_bytes()) ^ (index as u64).rotate_left(32);
            let mut channel = || (splitmix64(&mut state) >> 40) as f32 / (1u64 << 24) as f32;
            [channel(), channel(), channel(), 1.0]
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
