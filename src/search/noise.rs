use rand::rngs::SmallRng;
use rand::Rng;

/// Picks uniformly from the top `beam` entries of `scored` (by score, ties
/// kept in input order). Returns an index into `scored`. With a beam of one
/// the pick is the first best entry and the rng is not consumed.
pub fn choose_from_beam<T>(scored: &[(T, i32)], beam: usize, rng: &mut SmallRng) -> Option<usize> {
    if scored.is_empty() { return None; }
    let pool = beam_pool(scored, beam);
    if pool.len() == 1 { return Some(pool[0]); }
    let idx = rng.gen_range(0..pool.len());
    Some(pool[idx])
}

/// Indices of the top `beam` entries, best first. `beam` is clipped to the
/// number of candidates.
pub fn beam_pool<T>(scored: &[(T, i32)], beam: usize) -> Vec<usize> {
    let k = beam.max(1).min(scored.len());
    let mut order: Vec<usize> = (0..scored.len()).collect();
    // Stable: equal scores keep their search order
    order.sort_by(|&a, &b| scored[b].1.cmp(&scored[a].1));
    order.truncate(k);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[test]
    fn beam_of_one_is_first_best() {
        let scored = vec![("a", 10), ("b", 30), ("c", 30), ("d", -5)];
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(choose_from_beam(&scored, 1, &mut rng), Some(1));
        }
    }

    #[test]
    fn picks_stay_inside_the_beam() {
        let scored = vec![("a", 10), ("b", 30), ("c", 20), ("d", -5)];
        let mut rng = SmallRng::seed_from_u64(7);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let i = choose_from_beam(&scored, 2, &mut rng).unwrap();
            seen[i] = true;
        }
        assert_eq!(seen, [false, true, true, false]);
    }

    #[test]
    fn beam_is_clipped_to_candidates() {
        let scored = vec![("a", 1), ("b", 2)];
        assert_eq!(beam_pool(&scored, 5), vec![1, 0]);
        let empty: Vec<(&str, i32)> = Vec::new();
        assert_eq!(choose_from_beam(&empty, 3, &mut SmallRng::seed_from_u64(0)), None);
    }
}
