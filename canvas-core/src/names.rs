//! Fallback display names for sessions that join without one, in the style
//! of the teacher's generated-identifier helpers: human-readable, no
//! external state, good enough to tell two anonymous cursors apart.

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Amber", "Brisk", "Cobalt", "Dusty", "Eager", "Faded", "Gentle", "Hollow", "Indigo", "Jolly",
    "Keen", "Lucid", "Mellow", "Nimble", "Opal", "Plucky", "Quiet", "Ruddy", "Sleepy", "Tidy",
];

const NOUNS: &[&str] = &[
    "Badger", "Cricket", "Dolphin", "Egret", "Finch", "Gecko", "Heron", "Ibis", "Jackal", "Koala",
    "Lemur", "Magpie", "Newt", "Otter", "Puffin", "Quokka", "Raven", "Skink", "Tapir", "Vole",
];

/// Produces a name like "Quiet Otter 42". Collisions within a room are
/// tolerated — display names are decorative, never used as a key.
pub fn generate_display_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"Quiet");
    let noun = NOUNS.choose(&mut rng).unwrap_or(&"Otter");
    let suffix: u16 = rng.gen_range(1..100);
    format!("{adjective} {noun} {suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_three_words() {
        let name = generate_display_name();
        assert_eq!(name.split_whitespace().count(), 3);
    }
}
