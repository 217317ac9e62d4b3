//! Court deck construction and card movement primitives.

use rand::seq::SliceRandom;
use rand::Rng;

use super::types::{copies_per_influence, Influence, ALL_INFLUENCES};

/// Fresh, unshuffled deck sized for the roster.
pub fn build_deck(player_count: usize) -> Vec<Influence> {
    let copies = copies_per_influence(player_count);
    ALL_INFLUENCES
        .iter()
        .flat_map(|&card| std::iter::repeat(card).take(copies))
        .collect()
}

pub fn shuffled_deck<R: Rng + ?Sized>(player_count: usize, rng: &mut R) -> Vec<Influence> {
    let mut deck = build_deck(player_count);
    deck.shuffle(rng);
    deck
}

/// Draw from the top of the deck. None once the deck is exhausted.
pub fn draw(deck: &mut Vec<Influence>) -> Option<Influence> {
    deck.pop()
}

/// Shuffle `card` back into the deck.
pub fn return_to_deck<R: Rng + ?Sized>(deck: &mut Vec<Influence>, card: Influence, rng: &mut R) {
    deck.push(card);
    deck.shuffle(rng);
}

/// Remove one copy of `card` from `cards`, returning whether it was present.
pub fn take_card(cards: &mut Vec<Influence>, card: Influence) -> bool {
    match cards.iter().position(|&c| c == card) {
        Some(idx) => {
            cards.remove(idx);
            true
        }
        None => false,
    }
}

/// Count of `card` within a pile.
pub fn count_of(cards: &[Influence], card: Influence) -> usize {
    cards.iter().filter(|&&c| c == card).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_deck_sizes() {
        assert_eq!(build_deck(3).len(), 15);
        assert_eq!(build_deck(7).len(), 20);
        assert_eq!(build_deck(9).len(), 25);
        for card in ALL_INFLUENCES {
            assert_eq!(count_of(&build_deck(8), card), 4);
        }
    }

    #[test]
    fn test_return_and_draw_preserve_counts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = shuffled_deck(4, &mut rng);
        let card = draw(&mut deck).unwrap();
        assert_eq!(deck.len(), 14);
        return_to_deck(&mut deck, card, &mut rng);
        assert_eq!(deck.len(), 15);
        assert_eq!(count_of(&deck, card), 3);
    }

    #[test]
    fn test_take_card_removes_single_copy() {
        let mut hand = vec![Influence::Duke, Influence::Duke];
        assert!(take_card(&mut hand, Influence::Duke));
        assert_eq!(hand, vec![Influence::Duke]);
        assert!(!take_card(&mut hand, Influence::Captain));
    }
}
