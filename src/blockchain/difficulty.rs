use log::info;

use super::{BLOCK_GENERATION_INTERVAL_SECS, Block, DIFFICULTY_ADJUSTMENT_INTERVAL};

/// How the next difficulty target is derived from chain history. The two
/// policies are mutually inconsistent by design; a deployment picks exactly
/// one (`WallClock` is the default, see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyPolicy {
    /// Compare wall-clock time across the adjustment window against the
    /// expected generation time.
    WallClock,
    /// Compare summed per-block mining durations over the adjustment window
    /// against the expected generation time.
    MiningDuration,
}

impl DifficultyPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wall-clock" | "wallclock" => Some(Self::WallClock),
            "mining-duration" | "miningduration" => Some(Self::MiningDuration),
            _ => None,
        }
    }
}

/// Difficulty target for the next block. Adjustment only runs when the
/// latest index is a positive multiple of the adjustment interval; otherwise
/// the latest difficulty carries over unchanged.
pub fn next_difficulty(chain: &[Block], policy: DifficultyPolicy) -> u32 {
    let latest = match chain.last() {
        Some(b) => b,
        None => return 0,
    };
    let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    if latest.index == 0 || latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL != 0 {
        return latest.difficulty;
    }
    match policy {
        DifficultyPolicy::WallClock => adjust_wall_clock(chain, latest, interval),
        DifficultyPolicy::MiningDuration => adjust_mining_duration(chain, latest, interval),
    }
}

fn adjust_wall_clock(chain: &[Block], latest: &Block, interval: usize) -> u32 {
    let adjustment = &chain[chain.len() - interval];
    let expected = BLOCK_GENERATION_INTERVAL_SECS * interval as i64;
    let actual = latest.timestamp - adjustment.timestamp;
    let base = adjustment.difficulty;

    let next = if actual < expected / 4 {
        base + 2
    } else if actual < expected * 2 / 3 {
        base + 1
    } else if actual > expected * 4 {
        base.saturating_sub(2)
    } else if actual > expected * 3 / 2 {
        base.saturating_sub(1)
    } else {
        base
    };
    if next != base {
        info!(
            "DIFFICULTY - wall-clock adjustment at #{}: expected {}s, actual {}s, {} -> {}",
            latest.index, expected, actual, base, next
        );
    }
    next
}

fn adjust_mining_duration(chain: &[Block], latest: &Block, interval: usize) -> u32 {
    let window = &chain[chain.len() - interval..];
    let expected = (BLOCK_GENERATION_INTERVAL_SECS * interval as i64) as f64;
    let actual: f64 = window.iter().map(|b| b.mining_time).sum();
    let ratio = actual / expected;
    let base = latest.difficulty;

    let next = if ratio < 0.5 {
        base + 1
    } else if ratio > 2.0 {
        base.saturating_sub(1).max(1)
    } else {
        base
    };
    if next != base {
        info!(
            "DIFFICULTY - mining-duration adjustment at #{}: ratio {:.2}, {} -> {}",
            latest.index, ratio, base, next
        );
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain of `len` blocks with uniform spacing and per-block duration.
    /// Hashes are irrelevant to difficulty derivation.
    fn synthetic_chain(len: u64, spacing_secs: i64, difficulty: u32, duration: f64) -> Vec<Block> {
        (0..len)
            .map(|i| Block {
                index: i,
                data: String::new(),
                timestamp: 1_000_000 + i as i64 * spacing_secs,
                previous_hash: String::new(),
                difficulty,
                nonce: 0,
                hash: String::new(),
                mining_time: if i == 0 { 0.0 } else { duration },
            })
            .collect()
    }

    #[test]
    fn off_interval_keeps_difficulty() {
        // latest index 9, not a multiple of the interval
        let chain = synthetic_chain(10, 1, 3, 1.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 3);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::MiningDuration), 3);
    }

    #[test]
    fn genesis_only_keeps_difficulty() {
        let chain = synthetic_chain(1, 1, 0, 0.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 0);
    }

    #[test]
    fn wall_clock_very_fast_raises_by_two() {
        // 10 blocks in 10s, expected 100s: under expected/4
        let chain = synthetic_chain(11, 1, 3, 1.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 5);
    }

    #[test]
    fn wall_clock_fast_raises_by_one() {
        // 10 blocks at 5s spacing: 50s actual, under 2/3 of expected
        let chain = synthetic_chain(11, 5, 3, 5.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 4);
    }

    #[test]
    fn wall_clock_very_slow_drops_by_two_with_floor() {
        // 10 blocks at 50s spacing: 500s actual, over 4x expected
        let chain = synthetic_chain(11, 50, 1, 50.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 0);
    }

    #[test]
    fn wall_clock_slow_drops_by_one() {
        // 10 blocks at 20s spacing: 200s actual, over 1.5x expected
        let chain = synthetic_chain(11, 20, 3, 20.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 2);
    }

    #[test]
    fn wall_clock_in_range_keeps_difficulty() {
        let chain = synthetic_chain(11, 10, 3, 10.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::WallClock), 3);
    }

    #[test]
    fn mining_duration_fast_raises_by_one() {
        // summed durations 10 * 2s = 20s against expected 100s: ratio 0.2
        let chain = synthetic_chain(11, 10, 3, 2.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::MiningDuration), 4);
    }

    #[test]
    fn mining_duration_slow_drops_with_floor_one() {
        // ratio well over 2.0, but difficulty never drops below 1
        let chain = synthetic_chain(11, 10, 1, 30.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::MiningDuration), 1);
    }

    #[test]
    fn mining_duration_in_range_keeps_difficulty() {
        let chain = synthetic_chain(11, 10, 3, 10.0);
        assert_eq!(next_difficulty(&chain, DifficultyPolicy::MiningDuration), 3);
    }
}
