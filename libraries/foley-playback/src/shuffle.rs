//! Effect selection: uniform picks, no-repeat picks and the soundtrack deck

use foley_core::{EffectDescriptor, EffectId};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Below this many options the no-repeat rule is not applied
pub const NO_REPEAT_MIN_OPTIONS: usize = 3;

/// Uniformly random descriptor
pub fn pick_uniform(effects: &[EffectDescriptor]) -> Option<&EffectDescriptor> {
    effects.choose(&mut thread_rng())
}

/// Random selection that never repeats the previous pick
///
/// Reject-and-resample: draws uniformly until the id differs from the last
/// one. With fewer than [`NO_REPEAT_MIN_OPTIONS`] descriptors every draw is
/// accepted.
#[derive(Debug, Clone, Default)]
pub struct NoRepeatSelector {
    previous: Option<EffectId>,
}

impl NoRepeatSelector {
    /// Start with `previous` as the pick to avoid
    pub fn new(previous: Option<EffectId>) -> Self {
        Self { previous }
    }

    /// Last accepted pick
    pub fn previous(&self) -> Option<&EffectId> {
        self.previous.as_ref()
    }

    /// Draw the next descriptor
    pub fn pick<'a>(&mut self, effects: &'a [EffectDescriptor]) -> Option<&'a EffectDescriptor> {
        self.pick_with(effects, &mut thread_rng())
    }

    /// Draw the next descriptor from `rng`
    pub fn pick_with<'a, R: Rng + ?Sized>(
        &mut self,
        effects: &'a [EffectDescriptor],
        rng: &mut R,
    ) -> Option<&'a EffectDescriptor> {
        let enforce = effects.len() >= NO_REPEAT_MIN_OPTIONS
            && self
                .previous
                .as_ref()
                .is_some_and(|prev| effects.iter().any(|e| &e.id != prev));

        let picked = loop {
            let candidate = effects.choose(rng)?;
            if !enforce || Some(&candidate.id) != self.previous.as_ref() {
                break candidate;
            }
        };

        self.previous = Some(picked.id.clone());
        Some(picked)
    }
}

/// Endless shuffled deck
///
/// Fisher-Yates draw without replacement; when the deck runs out it is
/// reshuffled and dealt again.
#[derive(Debug, Clone)]
pub struct ShuffleDeck<T> {
    cards: Vec<T>,
    order: Vec<usize>,
    cursor: usize,
}

impl<T: Clone> ShuffleDeck<T> {
    /// Deck over `cards`, shuffled on the first draw
    pub fn new(cards: Vec<T>) -> Self {
        let order = (0..cards.len()).collect();
        let cursor = cards.len();
        Self {
            cards,
            order,
            cursor,
        }
    }

    /// Number of distinct cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the deck has no cards
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Next card, reshuffling when the current pass is exhausted
    pub fn draw(&mut self) -> Option<T> {
        if self.cards.is_empty() {
            return None;
        }
        if self.cursor >= self.order.len() {
            self.order.shuffle(&mut thread_rng());
            self.cursor = 0;
        }
        let card = self.cards[self.order[self.cursor]].clone();
        self.cursor += 1;
        Some(card)
    }
}
