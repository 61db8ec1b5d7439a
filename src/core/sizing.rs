// Position sizing by creator score tier

/// Score at or above which the full size is used
pub const FULL_SIZE_SCORE: f64 = 80.0;
/// Score at or above which half size is used
pub const HALF_SIZE_SCORE: f64 = 60.0;

/// Tiered size: full, half or quarter of `max_size`, then capped by `cap`
pub fn position_size(creator_score: f64, max_size: f64, cap: Option<f64>) -> f64 {
    let size = if creator_score >= FULL_SIZE_SCORE {
        max_size
    } else if creator_score >= HALF_SIZE_SCORE {
        max_size / 2.0
    } else {
        max_size / 4.0
    };

    match cap {
        Some(cap) => size.min(cap),
        None => size,
    }
}
