use super::super::domain::Tier;

pub const SAFE_THRESHOLD: u8 = 80;
pub const APPROPRIATE_THRESHOLD: u8 = 50;
pub const BOLD_THRESHOLD: u8 = 20;

/// Lower bounds are inclusive: 80 is S, 50 is A, 20 is B.
pub fn classify(probability: u8) -> Tier {
    match probability {
        p if p >= SAFE_THRESHOLD => Tier::S,
        p if p >= APPROPRIATE_THRESHOLD => Tier::A,
        p if p >= BOLD_THRESHOLD => Tier::B,
        _ => Tier::C,
    }
}
