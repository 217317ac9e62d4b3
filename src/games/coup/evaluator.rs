//! Heuristic evaluation for the Coup AI: card-counting probabilities,
//! opponent threat scores and hand values.

use super::deck::count_of;
use super::types::*;
use super::view::{PublicGameState, PublicPlayer};

pub const DANGER_PER_INFLUENCE: u32 = 10;
pub const DANGER_PER_COIN: u32 = 1;

/// Copies of `influence` in play for this room.
pub fn total_copies(view: &PublicGameState) -> usize {
    copies_per_influence(view.players.len())
}

/// Copies of `influence` revealed on dead piles.
pub fn dead_copies(view: &PublicGameState, influence: Influence) -> usize {
    view.players
        .iter()
        .map(|p| count_of(&p.dead_influences, influence))
        .sum()
}

pub fn all_copies_dead(view: &PublicGameState, influence: Influence) -> bool {
    dead_copies(view, influence) >= total_copies(view)
}

/// Chance that a given unseen card is `influence`, from `me`'s point of view.
///
/// Remaining copies are those neither dead nor in `me`'s hand; unseen cards
/// are the deck plus every other player's held influences.
pub fn influence_probability(view: &PublicGameState, me: &Player, influence: Influence) -> f64 {
    let accounted = dead_copies(view, influence) + count_of(&me.influences, influence);
    let remaining = total_copies(view).saturating_sub(accounted);
    if remaining == 0 {
        return 0.0;
    }
    let unseen = view.deck_count
        + view
            .players
            .iter()
            .filter(|p| p.name != me.name)
            .map(|p| p.influence_count)
            .sum::<usize>();
    if unseen == 0 {
        return 0.0;
    }
    (remaining as f64 / unseen as f64).min(1.0)
}

/// Copies that could still be held by someone other than `me`.
///
/// A public claim by `me` counts as holding one copy even if `me` no longer
/// holds it, since opponents will reason the same way.
pub fn copies_outside(view: &PublicGameState, me: &Player, influence: Influence) -> usize {
    let held = count_of(&me.influences, influence);
    let claimed = usize::from(me.claimed_influences.contains(&influence));
    let attributed = held.max(claimed);
    total_copies(view).saturating_sub(dead_copies(view, influence) + attributed)
}

/// True when nobody else can possibly hold `influence`.
pub fn claim_impossible(view: &PublicGameState, me: &Player, influence: Influence) -> bool {
    copies_outside(view, me, influence) == 0
}

/// Threat score: 10 per held influence plus 1 per coin; 0 once eliminated.
pub fn danger_factor(player: &PublicPlayer) -> u32 {
    if player.influence_count == 0 {
        return 0;
    }
    DANGER_PER_INFLUENCE * player.influence_count as u32 + DANGER_PER_COIN * player.coins
}

/// Relative keep-value of a card; higher is kept longer.
pub fn card_value(influence: Influence) -> u32 {
    match influence {
        Influence::Duke => 5,
        Influence::Captain => 4,
        Influence::Contessa => 3,
        Influence::Assassin => 2,
        Influence::Ambassador => 1,
    }
}

/// Hand ordered from least to most valuable; a duplicate is worth less than
/// its first copy.
pub fn cards_by_value(hand: &[Influence]) -> Vec<Influence> {
    let mut scored: Vec<(u32, Influence)> = Vec::with_capacity(hand.len());
    for &card in hand {
        let seen = scored.iter().filter(|(_, c)| *c == card).count() as u32;
        scored.push((card_value(card) * 2 - seen.min(card_value(card)), card));
    }
    scored.sort_by_key(|&(value, card)| (value, card));
    scored.into_iter().map(|(_, card)| card).collect()
}

/// Pick the opponent to act against: highest danger, weighted by grudges.
pub fn pick_target<'a>(
    view: &'a PublicGameState,
    me: &Player,
    vengefulness: u8,
) -> Option<&'a PublicPlayer> {
    let mut best: Option<(u32, &PublicPlayer)> = None;
    for candidate in view.living_players().filter(|p| p.name != me.name) {
        let grudge = me.grudges.get(&candidate.name).copied().unwrap_or(0);
        let score = danger_factor(candidate) + grudge * u32::from(vengefulness) / 25;
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, p)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coup::view::public_view;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn public(coins: u32, influence_count: usize) -> PublicPlayer {
        PublicPlayer {
            name: "X".into(),
            color: "#000000".into(),
            coins,
            influence_count,
            dead_influences: vec![],
            claimed_influences: Default::default(),
            unclaimed_influences: Default::default(),
            ai: false,
            personality: None,
            grudges: Default::default(),
        }
    }

    fn three_player_state() -> GameState {
        let mut rng = StdRng::seed_from_u64(21);
        let mut state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        state.players.push(Player::new("Harper", "#3399dd"));
        state.players.push(Player::new("Hailey", "#FD6C33"));
        state.redeal(&mut rng);
        state
    }

    #[test]
    fn test_danger_factor() {
        assert_eq!(danger_factor(&public(0, 1)), 10);
        assert_eq!(danger_factor(&public(12, 1)), 22);
        assert_eq!(danger_factor(&public(12, 0)), 0);
        assert_eq!(danger_factor(&public(3, 2)), 23);
    }

    #[test]
    fn test_probability_zero_when_all_copies_accounted() {
        let mut state = three_player_state();
        state.players[0].influences = vec![Influence::Duke, Influence::Duke];
        state.players[1].dead_influences = vec![Influence::Duke];
        let view = public_view(&state, Some("David"));
        let me = state.players[0].clone();
        assert_eq!(influence_probability(&view, &me, Influence::Duke), 0.0);
        assert!(claim_impossible(&view, &me, Influence::Duke));
    }

    #[test]
    fn test_probability_counts_unseen_cards() {
        let mut state = three_player_state();
        state.players[0].influences = vec![Influence::Captain, Influence::Contessa];
        let view = public_view(&state, Some("David"));
        let me = state.players[0].clone();
        // 3 Dukes unaccounted among 9 deck cards and 4 opponent cards.
        let p = influence_probability(&view, &me, Influence::Duke);
        assert!((p - 3.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_public_claim_counts_as_held() {
        let mut state = three_player_state();
        state.players[0].influences = vec![Influence::Captain, Influence::Contessa];
        state.players[0].claimed_influences.insert(Influence::Duke);
        state.players[1].dead_influences = vec![Influence::Duke, Influence::Duke];
        let view = public_view(&state, Some("David"));
        let me = state.players[0].clone();
        assert_eq!(copies_outside(&view, &me, Influence::Duke), 0);
    }

    #[test]
    fn test_cards_by_value_discounts_duplicates() {
        let order = cards_by_value(&[Influence::Duke, Influence::Ambassador, Influence::Duke]);
        assert_eq!(order.first(), Some(&Influence::Ambassador));
        assert_eq!(order.last(), Some(&Influence::Duke));
        let order = cards_by_value(&[Influence::Captain, Influence::Captain, Influence::Contessa]);
        assert_eq!(order[0], Influence::Contessa);
    }

    #[test]
    fn test_pick_target_prefers_danger_then_grudges() {
        let mut state = three_player_state();
        state.players[1].coins = 6;
        let view = public_view(&state, Some("David"));
        let mut me = state.players[0].clone();
        assert_eq!(pick_target(&view, &me, 50).unwrap().name, "Harper");
        me.grudges.insert("Hailey".into(), 4);
        assert_eq!(pick_target(&view, &me, 100).unwrap().name, "Hailey");
    }
}
