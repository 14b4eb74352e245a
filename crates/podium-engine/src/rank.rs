//! Pure rank computation over leaderboard state.
//!
//! Every query path -- the write-side rank recomputation, `rank_of`, and
//! `top` -- orders entries by the same key: total score descending, then
//! player id ascending. The secondary key is what keeps ranks gap-free:
//! two entries with equal totals still have a strict order, so the set of
//! active ranks is always exactly `1..=K`.
//!
//! Player id ascending was chosen as the tie-break because the IDs are
//! UUID v7 (time-ordered): among equal totals, the earlier-registered
//! player wins the tie, and the order is stable across restarts.

use core::cmp::Ordering;

use rust_decimal::Decimal;

use podium_types::{LeaderboardEntry, PlayerId};

/// Scale (decimal places) used for win rates.
const RATIO_SCALE: u32 = 4;

/// Scale (decimal places) used for percentiles.
const PERCENTILE_SCALE: u32 = 2;

/// Decimal 100, for percentile scaling.
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Return `true` if `(a_total, a_id)` strictly outranks `(b_total, b_id)`.
///
/// This is the predicate behind the write-side COUNT: a player's rank is
/// one plus the number of active entries that outrank them.
pub fn outranks(a_total: Decimal, a_id: PlayerId, b_total: Decimal, b_id: PlayerId) -> bool {
    match a_total.cmp(&b_total) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a_id < b_id,
    }
}

/// Compare two entries, best first.
///
/// Consistent with [`outranks`] by construction: sorting with this
/// comparator and counting outranking entries produce the same ordering,
/// which is the tie-break determinism property the tests pin down.
pub fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.total_score
        .cmp(&a.total_score)
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Convert an outranking-entry count into a 1-based rank.
pub const fn rank_from_outranked(count: u64) -> u64 {
    count.saturating_add(1)
}

/// Assign position-based ranks to an ordered page of entries.
///
/// `offset` is the number of entries skipped before this page, so the
/// first entry receives rank `offset + 1`.
pub fn assign_ranks(entries: &mut [LeaderboardEntry], offset: u64) {
    for (index, entry) in entries.iter_mut().enumerate() {
        let position = u64::try_from(index).unwrap_or(u64::MAX);
        entry.rank = offset.saturating_add(position).saturating_add(1);
    }
}

/// Percentile of active players a rank outranks, in `[0, 100]`.
///
/// Defined as `(active - rank) / active * 100`, rounded to
/// [`PERCENTILE_SCALE`] decimal places. Returns zero when there are no
/// active entries.
pub fn percentile(rank: u64, active_count: u64) -> Decimal {
    if active_count == 0 {
        return Decimal::ZERO;
    }
    let outranked = Decimal::from(active_count.saturating_sub(rank));
    let active = Decimal::from(active_count);
    outranked
        .checked_div(active)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .map_or(Decimal::ZERO, |p| p.round_dp(PERCENTILE_SCALE))
}

/// Win rate in `[0, 1]` from win and game counts.
///
/// Returns zero when no games have been played.
pub fn win_rate(wins: u32, games_played: u32) -> Decimal {
    if games_played == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(wins)
        .checked_div(Decimal::from(games_played))
        .map_or(Decimal::ZERO, |r| r.round_dp(RATIO_SCALE))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(total: i64, id: PlayerId) -> LeaderboardEntry {
        LeaderboardEntry {
            player_id: id,
            display_name: String::from("test"),
            total_score: Decimal::new(total, 0),
            rank: 0,
            games_played: 1,
            wins: 0,
            win_rate: Decimal::ZERO,
            last_updated: Utc::now(),
            active: true,
        }
    }

    #[test]
    fn higher_total_outranks() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        assert!(outranks(Decimal::new(200, 0), a, Decimal::new(100, 0), b));
        assert!(!outranks(Decimal::new(100, 0), a, Decimal::new(200, 0), b));
    }

    #[test]
    fn equal_totals_break_by_player_id() {
        let earlier = PlayerId::new();
        let later = PlayerId::new();
        let total = Decimal::new(500, 0);
        assert!(outranks(total, earlier, total, later));
        assert!(!outranks(total, later, total, earlier));
    }

    #[test]
    fn comparator_agrees_with_outranks() {
        let a = entry(300, PlayerId::new());
        let b = entry(300, PlayerId::new());
        let c = entry(100, PlayerId::new());
        let mut ordered = vec![c.clone(), b.clone(), a.clone()];
        ordered.sort_by(compare_entries);

        for pair in ordered.windows(2) {
            if let [first, second] = pair {
                assert!(outranks(
                    first.total_score,
                    first.player_id,
                    second.total_score,
                    second.player_id
                ));
            }
        }
    }

    #[test]
    fn assign_ranks_is_contiguous_from_offset() {
        let mut page = vec![
            entry(300, PlayerId::new()),
            entry(200, PlayerId::new()),
            entry(100, PlayerId::new()),
        ];
        assign_ranks(&mut page, 10);
        let ranks: Vec<u64> = page.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![11, 12, 13]);
    }

    #[test]
    fn percentile_bounds() {
        assert_eq!(percentile(1, 0), Decimal::ZERO);
        assert_eq!(percentile(4, 4), Decimal::ZERO);
        let top = percentile(1, 4);
        assert_eq!(top, Decimal::new(75, 0));
    }

    #[test]
    fn win_rate_handles_zero_games() {
        assert_eq!(win_rate(0, 0), Decimal::ZERO);
        assert_eq!(win_rate(1, 2), Decimal::new(5, 1));
    }
}
